//! Bounded conversation history
//!
//! Keeps the most recent turns so the responder sees conversational
//! context. The ring has a single owner; it carries no locking.

pub mod ring;

pub use ring::{HistoryEntry, HistoryRing, DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_WINDOW};
