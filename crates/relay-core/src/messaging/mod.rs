//! Messenger abstractions: the outbound delivery port and the inbound update model.

pub mod port;
pub mod throttled;
pub mod types;
