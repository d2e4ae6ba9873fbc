pub mod principal;
pub mod thread;

pub use principal::MongoPrincipalRepository;
pub use thread::MongoThreadRepository;
