//! JSON messages exchanged over the control socket.

use serde::{Deserialize, Serialize};

use crate::domain::SendEmailRequest;
use crate::domain::types::OwnerId;

/// Commands accepted by the campaign worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlRequest {
    StartCampaign {
        owner_id: OwnerId,
    },
    SendEmail {
        owner_id: OwnerId,
        request: SendEmailRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCampaignReply {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply written back for every [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    StartCampaign(StartCampaignReply),
    SendEmail(SendEmailReply),
}

impl ControlReply {
    /// Failure reply for a payload that is not a valid [`ControlRequest`].
    ///
    /// The reply takes the shape of the requested `action` when it can be
    /// read, so `start_campaign` callers always get a `StartCampaignReply`.
    pub fn malformed(payload: &[u8], error: &serde_json::Error) -> Self {
        let message = format!("malformed request: {error}");
        let action = serde_json::from_slice::<serde_json::Value>(payload)
            .ok()
            .and_then(|value| value.get("action")?.as_str().map(str::to_owned));

        match action.as_deref() {
            Some("start_campaign") => Self::StartCampaign(StartCampaignReply {
                accepted: false,
                reason: Some(message),
            }),
            _ => Self::SendEmail(SendEmailReply {
                success: false,
                error: Some(message),
            }),
        }
    }
}
