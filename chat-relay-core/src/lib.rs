//! Core types and traits for chat-relay
//!
//! This crate provides the event types, the bounded intake queue, the
//! conversation history ring, configuration and logging used by all other
//! chat-relay components.

pub mod bus;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod utils;

pub use error::{Error, Result};
