//! Database row types and wire messages.

pub mod account;
pub mod recipient;
pub mod template;
pub mod zmq;
