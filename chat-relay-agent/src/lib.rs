//! Batching and turn processing for chat-relay

pub mod batcher;
pub mod turn;

pub use batcher::{BatchHandler, BatcherConfig, DebounceBatcher};
pub use turn::{TurnError, TurnHandler, TurnOutcome};
