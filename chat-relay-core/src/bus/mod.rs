//! Intake bus for decoupled event delivery
//!
//! The bus provides a bounded intake queue between the transport's
//! notification context and the single batching worker.

pub mod events;
pub mod queue;

pub use events::{Batch, InboundEvent, OutboundMessage};
pub use queue::{EventBus, DEFAULT_INTAKE_CAPACITY};
