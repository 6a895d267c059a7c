//! Fixed-capacity, insertion-ordered history buffer

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::bus::InboundEvent;

/// Number of entries retained before the oldest is evicted
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Number of trailing entries handed to the responder
pub const DEFAULT_HISTORY_WINDOW: usize = 25;

/// One recorded conversation turn
///
/// Serialized with the responder's field names (`Sender`, `Name`, `Message`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "Sender")]
    pub sender: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl HistoryEntry {
    /// Create a new entry
    pub fn new(
        sender: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<&InboundEvent> for HistoryEntry {
    fn from(event: &InboundEvent) -> Self {
        Self::new(
            event.sender_id.clone(),
            event.sender_name().to_string(),
            event.text.clone(),
        )
    }
}

/// FIFO ring of recent turns
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryRing {
    /// Create a ring holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when over capacity
    pub fn append(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// The last `min(n, len)` entries in insertion order
    pub fn snapshot(&self, n: usize) -> Vec<HistoryEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.range(start..).cloned().collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize) -> HistoryEntry {
        HistoryEntry::new(format!("s{}", i), format!("n{}", i), format!("m{}", i))
    }

    #[test]
    fn test_append_keeps_order() {
        let mut ring = HistoryRing::new(5);
        for i in 0..3 {
            ring.append(entry(i));
        }
        let messages: Vec<_> = ring.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut ring = HistoryRing::default();
        for i in 0..137 {
            ring.append(entry(i));
            assert!(ring.len() <= DEFAULT_HISTORY_CAPACITY);
        }

        assert_eq!(ring.len(), 50);
        let first = ring.iter().next().unwrap();
        assert_eq!(first.message, "m87");
        let expected: Vec<_> = (87..137).map(entry).collect();
        assert_eq!(ring.snapshot(50), expected);
    }

    #[test]
    fn test_snapshot_is_suffix() {
        let mut ring = HistoryRing::default();
        for i in 0..40 {
            ring.append(entry(i));
        }

        let snap = ring.snapshot(DEFAULT_HISTORY_WINDOW);
        assert_eq!(snap.len(), 25);
        assert_eq!(snap.first().unwrap().message, "m15");
        assert_eq!(snap.last().unwrap().message, "m39");
        // Snapshot does not mutate the ring
        assert_eq!(ring.len(), 40);
    }

    #[test]
    fn test_snapshot_shorter_than_window() {
        let mut ring = HistoryRing::default();
        ring.append(entry(0));
        ring.append(entry(1));

        assert_eq!(ring.snapshot(25).len(), 2);
        assert!(ring.snapshot(0).is_empty());
        assert!(HistoryRing::default().snapshot(25).is_empty());
    }

    #[test]
    fn test_entry_from_event_uses_fallback_name() {
        let event = InboundEvent::new("whatsapp", "15550001", "hello");
        let from_event = HistoryEntry::from(&event);
        assert_eq!(from_event, HistoryEntry::new("15550001", "15550001", "hello"));
    }

    #[test]
    fn test_entry_wire_field_names() {
        let value = serde_json::to_value(HistoryEntry::new("1", "Zev", "yo")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"Sender": "1", "Name": "Zev", "Message": "yo"})
        );
    }
}
