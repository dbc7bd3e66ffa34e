//! Strongly typed identifiers used across the domain.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            pub const fn new(value: i32) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of the account that owns recipients, a template and
    /// sender credentials.
    OwnerId
);
id_type!(
    /// Identifier of a campaign recipient.
    RecipientId
);
id_type!(TemplateId);

/// Delivery progress of a single recipient.
///
/// The only transition is `Pending -> Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Sent,
}

impl DeliveryState {
    pub fn is_sent(self) -> bool {
        matches!(self, DeliveryState::Sent)
    }
}

impl From<bool> for DeliveryState {
    fn from(is_sent: bool) -> Self {
        if is_sent {
            DeliveryState::Sent
        } else {
            DeliveryState::Pending
        }
    }
}
