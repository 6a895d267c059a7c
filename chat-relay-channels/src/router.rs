//! Event router: transport notifications into the intake bus

use chat_relay_core::bus::EventBus;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::base::{Result, TransportEvent};

/// Forwards message notifications into the intake bus
///
/// Non-message notifications are logged and dropped. Forwarding waits when
/// the intake queue is full, pushing backpressure onto the transport.
#[derive(Clone)]
pub struct EventRouter {
    bus: EventBus,
}

impl EventRouter {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Route one notification; returns whether it reached the bus
    pub async fn route(&self, event: TransportEvent) -> Result<bool> {
        match event {
            TransportEvent::Message(message) => {
                debug!(
                    "Routing message from {} on {}",
                    message.sender_id, message.channel
                );
                self.bus.publish(message.into_inbound()).await?;
                Ok(true)
            }
            TransportEvent::Status(status) => {
                info!("Transport status: {}", status);
                Ok(false)
            }
            TransportEvent::Qr(_) => {
                info!("Pairing code received - complete login on the transport");
                Ok(false)
            }
            TransportEvent::Sent { to } => {
                debug!("Transport confirmed delivery to {}", to);
                Ok(false)
            }
            TransportEvent::Error(e) => {
                warn!("Transport reported error: {}", e);
                Ok(false)
            }
        }
    }

    /// Drain notifications until the transport side or the bus closes
    pub async fn run(self, mut events: mpsc::Receiver<TransportEvent>) {
        debug!("Event router started");
        while let Some(event) = events.recv().await {
            if let Err(e) = self.route(event).await {
                error!("Event router stopping: {}", e);
                break;
            }
        }
        debug!("Event router stopped");
    }

    /// Run the router as a background task
    pub fn spawn(self, events: mpsc::Receiver<TransportEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}
