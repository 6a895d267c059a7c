//! Turn handler: one batch in, at most one reply out

use async_trait::async_trait;
use chat_relay_channels::{ChannelError, TransportPtr};
use chat_relay_core::bus::{Batch, OutboundMessage};
use chat_relay_core::config::Config;
use chat_relay_core::history::{HistoryEntry, HistoryRing, DEFAULT_HISTORY_WINDOW};
use chat_relay_core::utils::truncate;
use chat_relay_responder::{Responder, ResponderError, ResponderRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::batcher::BatchHandler;

/// Reasons a turn ends without a delivered reply
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Responder call failed: {0}")]
    Responder(#[from] ResponderError),

    #[error("Responder timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reply send failed: {0}")]
    Send(#[from] ChannelError),
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Recipient of the reply
    pub recipient: String,
    /// Reply text as sent
    pub reply: String,
}

/// Processes batches: records history, asks the responder, sends the reply
///
/// Owns the history ring exclusively. Runs inline on the batcher worker, so
/// responder calls are strictly serialized.
pub struct TurnHandler {
    history: HistoryRing,
    history_window: usize,
    responder: Arc<dyn Responder>,
    transport: TransportPtr,
    responder_timeout: Option<Duration>,
}

impl TurnHandler {
    /// Create a handler with default history sizes and no call timeout
    pub fn new(responder: Arc<dyn Responder>, transport: TransportPtr) -> Self {
        Self {
            history: HistoryRing::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
            responder,
            transport,
            responder_timeout: None,
        }
    }

    /// Create a handler sized and bounded by configuration
    pub fn from_config(
        config: &Config,
        responder: Arc<dyn Responder>,
        transport: TransportPtr,
    ) -> Self {
        Self::new(responder, transport)
            .with_history(config.relay.history_capacity, config.relay.history_window)
            .with_responder_timeout(config.responder.timeout())
    }

    /// Set ring capacity and the number of entries sent per request
    pub fn with_history(mut self, capacity: usize, window: usize) -> Self {
        self.history = HistoryRing::new(capacity);
        self.history_window = window;
        self
    }

    /// Bound each responder call; `None` waits indefinitely
    pub fn with_responder_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.responder_timeout = timeout;
        self
    }

    /// Conversation history recorded so far
    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// Run one turn for `batch`
    pub async fn process(&mut self, batch: Batch) -> Result<TurnOutcome, TurnError> {
        for event in batch.events() {
            info!(
                "Message from {} -> {}",
                event.sender_id,
                truncate(&event.text, 80)
            );
            self.history.append(HistoryEntry::from(event));
        }

        let last = batch.last();
        let request = ResponderRequest::new(
            last.text.clone(),
            self.history.snapshot(self.history_window),
            last.sender_name(),
        );
        debug!(
            "Calling responder at {} for {} ({} events in batch)",
            self.responder.endpoint(),
            request.person,
            batch.len()
        );

        let call = self.responder.respond(request);
        let response = match self.responder_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| TurnError::Timeout(limit))??,
            None => call.await?,
        };
        info!("Response: {}", truncate(&response.response, 80));

        let reply = OutboundMessage::reply_to(last, response.response);
        let outcome = TurnOutcome {
            recipient: reply.recipient.clone(),
            reply: reply.content.clone(),
        };
        self.transport.read().await.send(reply).await?;

        Ok(outcome)
    }
}

#[async_trait]
impl BatchHandler for TurnHandler {
    async fn handle(&mut self, batch: Batch) {
        let sender = batch.last().sender_id.clone();
        match self.process(batch).await {
            Ok(outcome) => debug!("Reply delivered to {}", outcome.recipient),
            Err(TurnError::Send(e)) => error!("Failed to send reply to {}: {}", sender, e),
            Err(e) => warn!("Turn for {} abandoned: {}", sender, e),
        }
    }
}
