//! Delivery of composed messages to the mail relay.
//!
//! Two transports are available, both over implicit TLS:
//! [`smtps::SmtpsTransport`] drives the SMTP dialogue itself and reports
//! exactly which stage failed, while [`dial::DialMailer`] hands the message
//! to `mail-send` in one call.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::campaign::message_builder::{ComposeError, ComposedMessage};
use crate::config::{RelaySettings, TransportMode};
use crate::domain::Credentials;
use crate::errors::Error;

pub mod dial;
pub mod smtps;

/// Step of the relay dialogue at which delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Tls,
    Greeting,
    Ehlo,
    Auth,
    MailFrom,
    RcptTo,
    Data,
    Body,
    Quit,
    Dial,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::Tls => "tls handshake",
            Stage::Greeting => "greeting",
            Stage::Ehlo => "EHLO",
            Stage::Auth => "AUTH",
            Stage::MailFrom => "MAIL FROM",
            Stage::RcptTo => "RCPT TO",
            Stage::Data => "DATA",
            Stage::Body => "message body",
            Stage::Quit => "QUIT",
            Stage::Dial => "dial-and-send",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a [`TransportError`].
#[derive(Debug, Error)]
pub enum TransportCause {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid server name {0}")]
    InvalidServerName(String),

    #[error("relay replied {code}: {reply}")]
    Rejected { code: u16, reply: String },

    #[error("unparseable reply: {0}")]
    UnexpectedReply(String),

    #[error("{0}")]
    Render(#[from] ComposeError),

    #[error("{0}")]
    Smtp(#[from] mail_send::Error),
}

/// A message was not accepted by the relay.
///
/// There is no partial success: any failing stage means the message was
/// not delivered.
#[derive(Debug, Error)]
#[error("{stage} failed: {cause}")]
pub struct TransportError {
    pub stage: Stage,
    #[source]
    pub cause: TransportCause,
}

impl TransportError {
    pub fn new(stage: Stage, cause: impl Into<TransportCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

/// Abstraction over message delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one message authenticated as `credentials`.
    async fn deliver(
        &self,
        message: &ComposedMessage,
        credentials: &Credentials,
    ) -> Result<(), TransportError>;
}

/// The transport selected by [`RelaySettings::mode`].
pub enum RelayMailer {
    Session(smtps::SmtpsTransport),
    Dial(dial::DialMailer),
}

impl RelayMailer {
    pub fn from_settings(settings: &RelaySettings) -> Result<Self, Error> {
        Ok(match settings.mode {
            TransportMode::Session => Self::Session(smtps::SmtpsTransport::new(settings.clone())?),
            TransportMode::Dial => Self::Dial(dial::DialMailer::new(settings.clone())),
        })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn deliver(
        &self,
        message: &ComposedMessage,
        credentials: &Credentials,
    ) -> Result<(), TransportError> {
        match self {
            RelayMailer::Session(transport) => transport.deliver(message, credentials).await,
            RelayMailer::Dial(transport) => transport.deliver(message, credentials).await,
        }
    }
}
