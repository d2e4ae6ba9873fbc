pub mod models;
pub mod store;
pub mod error;
pub mod dbs;

pub use models::{ChatThread, Principal, Turn, TurnRole, DEFAULT_THREAD_NAME};
pub use store::{DebitOutcome, PrincipalStore, ThreadStore};
pub use error::{PersistError, Result};
pub use dbs::memory::InMemoryStore;

#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoPersistenceClient;
