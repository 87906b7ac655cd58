//! Common error types for rxinv

use thiserror::Error;

/// Common result type for rxinv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across rxinv crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when SQLite reported lock contention ("database is locked")
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => db_err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}
