//! Base trait for messaging transports

use async_trait::async_trait;
use chat_relay_core::bus::{InboundEvent, OutboundMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Notification emitted by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A chat message from a user
    Message(MessageEvent),
    /// Connection status change
    Status(String),
    /// Login code emitted during session pairing
    Qr(String),
    /// Delivery acknowledgement for an outbound send
    Sent { to: String },
    /// Transport-reported failure
    Error(String),
}

/// Chat message payload carried by [`TransportEvent::Message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Transport identifier
    pub channel: String,
    /// Transport-scoped sender identifier
    pub sender_id: String,
    /// Display name announced by the sender
    pub display_name: Option<String>,
    /// Message text
    pub text: String,
}

impl MessageEvent {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            display_name: None,
            text: text.into(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Stamp the message with the current time as an intake event
    pub fn into_inbound(self) -> InboundEvent {
        let event = InboundEvent::new(self.channel, self.sender_id, self.text);
        match self.display_name {
            Some(name) => event.with_display_name(name),
            None => event,
        }
    }
}

/// Trait for messaging transports
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the transport name
    fn name(&self) -> &str;

    /// Check if the transport is running
    fn is_running(&self) -> bool;

    /// Start the transport (connect and begin emitting events)
    async fn start(&mut self) -> Result<()>;

    /// Stop the transport
    async fn stop(&mut self) -> Result<()>;

    /// Send a message
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Set the sink receiving transport notifications
    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>);

    /// Check if a sender is allowed
    fn is_allowed(&self, sender_id: &str) -> bool;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel not running: {0}")]
    NotRunning(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Send error: {0}")]
    SendError(String),

    #[error("Intake error: {0}")]
    Intake(#[from] chat_relay_core::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Shared transport handle
pub type TransportPtr = Arc<RwLock<dyn Transport>>;

/// Allowlist check shared by transports (empty list allows everyone)
pub fn sender_allowed(allow_from: &[String], sender_id: &str) -> bool {
    if allow_from.is_empty() {
        return true;
    }

    allow_from.iter().any(|a| a == sender_id)
}
