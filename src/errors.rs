//! Common error type for the Pigeon campaign worker.
//!
//! The worker talks to a mail relay, a SQLite store and a ZeroMQ control
//! socket. This module consolidates the possible failures into a single
//! [`Error`] enum so that callers can use a simple `Result<T, Error>`
//! without relying on panicking calls like `unwrap` or `expect`.

use thiserror::Error;

use crate::campaign::message_builder::ComposeError;
use crate::domain::types::OwnerId;
use crate::repository::errors::RepositoryError;
use crate::transport::TransportError;

/// Reasons a campaign or an ad-hoc send is refused before any message is
/// handed to the relay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    /// The owner account does not exist.
    #[error("account {0} not found")]
    OwnerNotFound(OwnerId),

    /// Sender address or mail app password is not configured.
    #[error("email credentials are not configured for account {0}")]
    MissingCredentials(OwnerId),

    /// The owner has no template to render the campaign from.
    #[error("no email template configured for account {0}")]
    MissingTemplate(OwnerId),

    /// Another campaign for the same owner is still dispatching.
    #[error("a campaign is already running for account {0}")]
    CampaignAlreadyRunning(OwnerId),

    /// The ad-hoc send request is incomplete.
    #[error("invalid send request: {0}")]
    InvalidRequest(&'static str),
}

/// Errors that can occur while running the worker.
#[derive(Debug, Error)]
pub enum Error {
    /// Campaign start or ad-hoc send refused up front.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Rendering a message failed (bad attachment).
    #[error("compose error: {0}")]
    Compose(#[from] ComposeError),

    /// Handing a message to the relay failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Persistence layer failures.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Errors while constructing the database pool.
    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// Errors originating from ZeroMQ operations.
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    /// Malformed control messages.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TLS client configuration failures.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// Settings could not be loaded.
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Problems with environment or configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
