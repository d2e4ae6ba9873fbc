mod chat_thread;
mod principal;

// Export database-agnostic models
pub use chat_thread::{ChatThread, Turn, TurnRole, DEFAULT_THREAD_NAME};
pub use principal::Principal;
