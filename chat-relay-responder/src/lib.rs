//! Responder service client for chat-relay
//!
//! The responder is the external service that turns a message plus recent
//! history into a reply.

pub mod base;
pub mod http;

pub use base::{Responder, ResponderError, ResponderRequest, ResponderResponse, ResponderResult};
pub use http::HttpResponder;
