//! Messaging transports for chat-relay
//!
//! A transport delivers inbound notifications and accepts outbound sends.
//! The event router bridges those notifications into the intake bus.

pub mod base;
pub mod router;
pub mod whatsapp;

pub use base::{ChannelError, MessageEvent, Result, Transport, TransportEvent, TransportPtr};
pub use router::EventRouter;
pub use whatsapp::WhatsAppTransport;
