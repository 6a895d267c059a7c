//! Debounce batcher: coalesces bursts of inbound events
//!
//! A single worker drains the intake queue through a small state machine:
//!
//! ```text
//!   Idle ──event──▶ Collecting { batch, deadline = now + D }
//!   Collecting ──event (batch < cap)──▶ Collecting   (deadline unchanged)
//!   Collecting ──batch reaches cap──▶ flush ──▶ Idle
//!   Collecting ──deadline──▶ flush ──▶ Idle
//!   any ──intake closed──▶ flush pending ──▶ stop
//! ```
//!
//! The window opens with the first event and is never extended, so a batch
//! closes at most D after its first event. With the default cap of two this
//! is a two-stage wait: block for one event, then wait for a second event or
//! the deadline, whichever comes first.
//!
//! Flushing hands the batch to the [`BatchHandler`] inline; the worker does
//! not read further events until the handler returns.

use async_trait::async_trait;
use chat_relay_core::bus::{Batch, InboundEvent};
use chat_relay_core::config::RelayConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Consumer of completed batches
#[async_trait]
pub trait BatchHandler: Send {
    /// Process one batch; failures must be handled inside
    async fn handle(&mut self, batch: Batch);
}

/// Window and cap for the batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatcherConfig {
    /// Debounce window D, measured from the first event of a batch
    pub debounce: Duration,
    /// Events after which a batch is flushed without waiting for D
    pub max_batch_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            max_batch_size: 2,
        }
    }
}

impl From<&RelayConfig> for BatcherConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            debounce: config.debounce(),
            max_batch_size: config.max_batch_size.max(1),
        }
    }
}

#[derive(Debug)]
enum BatcherState {
    Idle,
    Collecting { batch: Batch, deadline: Instant },
}

/// Single-consumer coalescing loop
pub struct DebounceBatcher<H> {
    config: BatcherConfig,
    intake: mpsc::Receiver<InboundEvent>,
    handler: H,
    flushed: u64,
}

impl<H: BatchHandler> DebounceBatcher<H> {
    pub fn new(config: BatcherConfig, intake: mpsc::Receiver<InboundEvent>, handler: H) -> Self {
        Self {
            config: BatcherConfig {
                max_batch_size: config.max_batch_size.max(1),
                ..config
            },
            intake,
            handler,
            flushed: 0,
        }
    }

    /// Run until the intake queue closes, then return the handler
    pub async fn run(mut self) -> H {
        info!(
            "Debounce batcher started (window: {:?}, max batch: {})",
            self.config.debounce, self.config.max_batch_size
        );

        let mut state = BatcherState::Idle;
        loop {
            state = match self.step(state).await {
                Some(next) => next,
                None => break,
            };
        }

        info!("Debounce batcher stopped after {} batches", self.flushed);
        self.handler
    }

    /// Run the batcher as a background task
    pub fn spawn(self) -> JoinHandle<H>
    where
        H: 'static,
    {
        tokio::spawn(self.run())
    }

    /// Advance the state machine by one transition; `None` means stop
    async fn step(&mut self, state: BatcherState) -> Option<BatcherState> {
        match state {
            BatcherState::Idle => {
                let event = self.intake.recv().await?;
                debug!("Batch opened by {}", event.sender_id);
                Some(BatcherState::Collecting {
                    batch: Batch::new(event),
                    deadline: Instant::now() + self.config.debounce,
                })
            }
            BatcherState::Collecting { batch, .. }
                if batch.len() >= self.config.max_batch_size =>
            {
                self.flush(batch, "cap").await;
                Some(BatcherState::Idle)
            }
            BatcherState::Collecting { mut batch, deadline } => {
                tokio::select! {
                    // Deadline first, so a batch never outlives D. An event still queued
                    // when the expired deadline is observed opens the next window, even
                    // if it was enqueued shortly before D while this worker was late.
                    biased;
                    _ = tokio::time::sleep_until(deadline) => {
                        self.flush(batch, "window").await;
                        Some(BatcherState::Idle)
                    }
                    event = self.intake.recv() => match event {
                        Some(event) => {
                            debug!("Batch extended by {} ({} pending)", event.sender_id, batch.len() + 1);
                            batch.push(event);
                            Some(BatcherState::Collecting { batch, deadline })
                        }
                        None => {
                            self.flush(batch, "intake closed").await;
                            None
                        }
                    },
                }
            }
        }
    }

    async fn flush(&mut self, batch: Batch, reason: &str) {
        self.flushed += 1;
        debug!("Flushing batch of {} ({})", batch.len(), reason);
        self.handler.handle(batch).await;
    }
}
