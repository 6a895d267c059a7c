//! Base trait and wire types for the responder

use async_trait::async_trait;
use chat_relay_core::history::HistoryEntry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for responder calls
#[derive(Error, Debug)]
pub enum ResponderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Responder returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ResponderResult<T> = Result<T, ResponderError>;

/// Request body sent to the responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderRequest {
    /// Text of the most recent message
    pub message: String,
    /// Trailing history, oldest first
    pub message_history: Vec<HistoryEntry>,
    /// Display name of the person being answered
    pub person: String,
}

impl ResponderRequest {
    pub fn new(
        message: impl Into<String>,
        message_history: Vec<HistoryEntry>,
        person: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            message_history,
            person: person.into(),
        }
    }
}

/// Response body returned by the responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderResponse {
    pub response: String,
}

/// A service that produces a reply for a message and its context
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply; any failure means no reply for this turn
    async fn respond(&self, request: ResponderRequest) -> ResponderResult<ResponderResponse>;

    /// Human-readable endpoint description for logs
    fn endpoint(&self) -> String;
}
