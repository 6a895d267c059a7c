//! Bounded intake queue implementation

use super::events::InboundEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Default number of events the intake queue holds before producers wait
pub const DEFAULT_INTAKE_CAPACITY: usize = 100;

pub type IntakeSender = mpsc::Sender<InboundEvent>;
pub type IntakeReceiver = mpsc::Receiver<InboundEvent>;

/// Intake bus that decouples transports from the batching worker
///
/// Producers publish events into a bounded queue; a single consumer takes
/// the receiver and drains it. When the queue is full, `publish` waits
/// (backpressure on the event source) so no event is dropped.
#[derive(Clone)]
pub struct EventBus {
    intake_tx: IntakeSender,
    intake_rx: Arc<RwLock<Option<IntakeReceiver>>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus with the default intake capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INTAKE_CAPACITY)
    }

    /// Create a new bus holding at most `capacity` pending events
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (intake_tx, intake_rx) = mpsc::channel(capacity);

        Self {
            intake_tx,
            intake_rx: Arc::new(RwLock::new(Some(intake_rx))),
            capacity,
        }
    }

    /// Take the intake receiver (can only be called once)
    pub async fn take_receiver(&self) -> Option<IntakeReceiver> {
        self.intake_rx.write().await.take()
    }

    /// Publish an event, waiting for room when the queue is full
    pub async fn publish(&self, event: InboundEvent) -> crate::Result<()> {
        if self.intake_tx.capacity() == 0 {
            debug!(
                "Intake queue full ({} pending), waiting for the batcher",
                self.capacity
            );
        }
        self.intake_tx
            .send(event)
            .await
            .map_err(|_| crate::Error::QueueClosed("Intake channel closed".to_string()))
    }

    /// Publish an event without waiting; fails when the queue is full
    pub fn try_publish(&self, event: InboundEvent) -> crate::Result<()> {
        self.intake_tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(dropped) => {
                warn!(
                    "Intake queue full, rejecting event from {}",
                    dropped.sender_id
                );
                crate::Error::QueueFull(self.capacity)
            }
            mpsc::error::TrySendError::Closed(_) => {
                crate::Error::QueueClosed("Intake channel closed".to_string())
            }
        })
    }

    /// Maximum number of pending events
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events currently waiting in the queue
    pub fn pending(&self) -> usize {
        self.capacity - self.intake_tx.capacity()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
