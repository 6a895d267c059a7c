//! Event types for the intake bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message event received from a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Transport identifier (e.g., "whatsapp")
    pub channel: String,
    /// Transport-scoped sender identifier
    pub sender_id: String,
    /// Display name announced by the sender, if any
    pub display_name: Option<String>,
    /// Message text content
    pub text: String,
    /// Arrival timestamp
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    /// Create a new inbound event stamped with the current time
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
            timestamp: Utc::now(),
        }
    }

    /// Attach a display name; blank names are ignored
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.display_name = Some(name);
        }
        self
    }

    /// Display name, falling back to the sender id when none was given
    pub fn sender_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.sender_id)
    }
}

/// Ordered, non-empty group of events closed by one debounce window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    events: Vec<InboundEvent>,
}

#[allow(clippy::len_without_is_empty)]
impl Batch {
    /// Open a batch with its first event
    pub fn new(first: InboundEvent) -> Self {
        Self {
            events: vec![first],
        }
    }

    /// Append an event in arrival order
    pub fn push(&mut self, event: InboundEvent) {
        self.events.push(event);
    }

    /// Number of events in the batch (always >= 1)
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events in arrival order
    pub fn events(&self) -> &[InboundEvent] {
        &self.events
    }

    /// Most recent event of the batch
    pub fn last(&self) -> &InboundEvent {
        // Non-empty by construction.
        &self.events[self.events.len() - 1]
    }

    /// Consume the batch, yielding its events in arrival order
    pub fn into_events(self) -> Vec<InboundEvent> {
        self.events
    }
}

/// Message to send through a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Transport identifier
    pub channel: String,
    /// Recipient identifier (transport-scoped)
    pub recipient: String,
    /// Message text content
    pub content: String,
}

impl OutboundMessage {
    /// Create a new outbound message
    pub fn new(
        channel: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            recipient: recipient.into(),
            content: content.into(),
        }
    }

    /// Build a reply addressed to the sender of `event`
    pub fn reply_to(event: &InboundEvent, content: impl Into<String>) -> Self {
        Self::new(event.channel.clone(), event.sender_id.clone(), content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_name_falls_back_to_id() {
        let event = InboundEvent::new("whatsapp", "15550001", "hi");
        assert_eq!(event.sender_name(), "15550001");

        let named = event.with_display_name("Gabe");
        assert_eq!(named.sender_name(), "Gabe");
    }

    #[test]
    fn test_blank_display_name_ignored() {
        let event = InboundEvent::new("whatsapp", "15550001", "hi").with_display_name("   ");
        assert!(event.display_name.is_none());
        assert_eq!(event.sender_name(), "15550001");
    }

    #[test]
    fn test_batch_preserves_arrival_order() {
        let mut batch = Batch::new(InboundEvent::new("test", "a", "first"));
        batch.push(InboundEvent::new("test", "b", "second"));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.last().text, "second");
        let texts: Vec<_> = batch.events().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_reply_targets_sender() {
        let event = InboundEvent::new("whatsapp", "15550001", "hi");
        let reply = OutboundMessage::reply_to(&event, "hello back");
        assert_eq!(reply.channel, "whatsapp");
        assert_eq!(reply.recipient, "15550001");
        assert_eq!(reply.content, "hello back");
    }
}
