//! Domain entities consumed by the campaign engine.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod types;

use types::{DeliveryState, OwnerId, RecipientId, TemplateId};

/// A contact eligible to receive campaign messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: RecipientId,
    pub display_name: String,
    pub organization_name: String,
    pub email_address: String,
    pub delivery_state: DeliveryState,
    pub owner_id: OwnerId,
    pub created_at: NaiveDateTime,
}

/// Data required to store a freshly extracted recipient.
#[derive(Debug, Clone)]
pub struct NewRecipient {
    pub owner_id: OwnerId,
    pub display_name: String,
    pub organization_name: String,
    pub email_address: String,
}

/// The single message template an owner renders campaigns from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub subject_pattern: String,
    pub body_pattern: String,
    pub owner_id: OwnerId,
    pub updated_at: NaiveDateTime,
}

/// Insert-or-replace payload for an owner's template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub owner_id: OwnerId,
    pub name: String,
    pub subject_pattern: String,
    pub body_pattern: String,
}

/// Sender identity used to authenticate against the relay.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub sender_address: String,
    pub sender_secret: String,
}

impl Credentials {
    /// Returns credentials only when both parts are present and non-blank.
    pub fn from_parts(address: Option<&str>, secret: Option<&str>) -> Option<Self> {
        match (address.map(str::trim), secret) {
            (Some(address), Some(secret)) if !address.is_empty() && !secret.trim().is_empty() => {
                Some(Self {
                    sender_address: address.to_owned(),
                    sender_secret: secret.to_owned(),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("sender_address", &self.sender_address)
            .field("sender_secret", &"<redacted>")
            .finish()
    }
}

/// The account running campaigns.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: OwnerId,
    pub display_name: String,
    pub credentials: Option<Credentials>,
}

/// Ad-hoc send issued outside a formal campaign.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendEmailRequest {
    #[serde(default)]
    pub recipient_address: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub send_to_all: bool,
    #[serde(default)]
    pub attachment_paths: Vec<PathBuf>,
}
