use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[cfg(feature = "mongodb")]
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Version conflict on thread {thread_id}: expected version {expected}")]
    VersionConflict { thread_id: String, expected: u64 },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PersistError {
    /// Failures worth another attempt after a short pause
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "mongodb")]
            PersistError::Database(_) => true,
            PersistError::Connection(_) | PersistError::Unavailable(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
