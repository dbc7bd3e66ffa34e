//! Outbound email campaign engine.
//!
//! The crate paces bulk delivery of templated messages to a mail relay,
//! tracks per-recipient delivery state in SQLite and exposes a small control
//! surface (start a campaign, send right now) over ZeroMQ.

pub mod campaign;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod models;
pub mod repository;
pub mod schema;
pub mod transport;
