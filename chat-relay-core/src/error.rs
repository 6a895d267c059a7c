//! Error types for chat-relay

use thiserror::Error;

/// The main error type for chat-relay core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Intake queue has been closed (receiver dropped)
    #[error("Queue closed: {0}")]
    QueueClosed(String),

    /// Intake queue is at capacity
    #[error("Queue full: capacity {0}")]
    QueueFull(usize),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// A specialized Result type for chat-relay core operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
