//! Entry points used by the rest of the application.
//!
//! [`CampaignControl::start_campaign`] checks preconditions and detaches the
//! dispatch loop; [`CampaignControl::send_now`] sends synchronously and
//! stops at the first failure. The two failure policies are intentionally
//! different.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::domain::SendEmailRequest;
use crate::domain::types::OwnerId;
use crate::errors::{Error, PreconditionError};
use crate::models::zmq::{SendEmailReply, StartCampaignReply};
use crate::repository::{AccountReader, RecipientReader, RecipientWriter, TemplateReader};
use crate::transport::Mailer;

use super::message_builder::{Draft, Sender, compose_draft};
use super::runner::{Campaign, CampaignReport, Loaded, Pacing, run_campaign};

/// Outcome of an accepted campaign start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStart {
    /// The dispatch loop is running in the background.
    Started { pending: usize },
    /// No recipient is pending; nothing was spawned.
    NothingPending,
}

/// Background campaign tasks, at most one per owner.
#[derive(Default)]
struct CampaignRegistry {
    running: Mutex<HashMap<OwnerId, JoinHandle<CampaignReport>>>,
}

impl CampaignRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<OwnerId, JoinHandle<CampaignReport>>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self, owner_id: OwnerId) -> bool {
        self.lock()
            .get(&owner_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    fn finish(&self, owner_id: OwnerId) {
        self.lock().remove(&owner_id);
    }
}

/// Campaign control boundary shared by request handlers.
pub struct CampaignControl<R, M> {
    repo: R,
    mailer: Arc<M>,
    registry: Arc<CampaignRegistry>,
    pacing: Pacing,
}

impl<R, M> Clone for CampaignControl<R, M>
where
    R: Clone,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            mailer: Arc::clone(&self.mailer),
            registry: Arc::clone(&self.registry),
            pacing: self.pacing,
        }
    }
}

impl<R, M> CampaignControl<R, M>
where
    R: AccountReader
        + TemplateReader
        + RecipientReader
        + RecipientWriter
        + Clone
        + Send
        + Sync
        + 'static,
    M: Mailer + 'static,
{
    pub fn new(repo: R, mailer: Arc<M>) -> Self {
        Self {
            repo,
            mailer,
            registry: Arc::new(CampaignRegistry::default()),
            pacing: Pacing::default(),
        }
    }

    /// Overrides the delays between attempts.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Whether a detached campaign for `owner_id` is still dispatching.
    pub fn is_running(&self, owner_id: OwnerId) -> bool {
        self.registry.is_running(owner_id)
    }

    /// Validates preconditions and spawns the dispatch loop.
    ///
    /// Returns as soon as the loop is detached; per-recipient outcomes are
    /// only visible later through the recipients' delivery state.
    pub fn start_campaign(&self, owner_id: OwnerId) -> Result<CampaignStart, Error> {
        let mut running = self.registry.lock();

        if running
            .get(&owner_id)
            .is_some_and(|handle| !handle.is_finished())
        {
            return Err(PreconditionError::CampaignAlreadyRunning(owner_id).into());
        }

        let campaign = match Campaign::load(&self.repo, owner_id)? {
            Loaded::Ready(campaign) => campaign,
            Loaded::NothingPending => {
                log::info!("No pending recipients for account {owner_id}; nothing to send");
                return Ok(CampaignStart::NothingPending);
            }
        };
        let pending = campaign.recipients.len();

        let repo = self.repo.clone();
        let mailer = Arc::clone(&self.mailer);
        let registry = Arc::clone(&self.registry);
        let pacing = self.pacing.campaign;
        let handle = tokio::spawn(async move {
            let report = run_campaign(campaign, &repo, mailer.as_ref(), pacing).await;
            registry.finish(owner_id);
            report
        });
        running.insert(owner_id, handle);

        log::info!("Campaign for account {owner_id} started with {pending} recipients");
        Ok(CampaignStart::Started { pending })
    }

    /// Sends an ad-hoc message right away.
    ///
    /// With `send_to_all` every known recipient is addressed in store order,
    /// regardless of delivery state, and the first failure aborts the call.
    /// Delivery state is not changed by this path.
    pub async fn send_now(
        &self,
        owner_id: OwnerId,
        request: &SendEmailRequest,
    ) -> Result<usize, Error> {
        if request.subject.trim().is_empty() || request.body.trim().is_empty() {
            return Err(PreconditionError::InvalidRequest("subject and body are required").into());
        }

        let owner = self
            .repo
            .get_account_by_id(owner_id)?
            .ok_or(PreconditionError::OwnerNotFound(owner_id))?;
        let credentials = owner
            .credentials
            .as_ref()
            .ok_or(PreconditionError::MissingCredentials(owner_id))?;

        let sender = Sender {
            name: owner.display_name.as_str(),
            address: credentials.sender_address.as_str(),
        };
        let draft = Draft {
            subject: request.subject.as_str(),
            body: request.body.as_str(),
            attachments: &request.attachment_paths,
        };
        let no_fields = HashMap::new();

        let addresses: Vec<String> = if request.send_to_all {
            self.repo
                .list_all(owner_id)?
                .into_iter()
                .map(|recipient| recipient.email_address)
                .collect()
        } else {
            let address = request
                .recipient_address
                .as_deref()
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .ok_or(PreconditionError::InvalidRequest(
                    "recipient_address is required when send_to_all is false",
                ))?;
            vec![address.to_owned()]
        };

        for (index, address) in addresses.iter().enumerate() {
            if index > 0 {
                sleep(self.pacing.send_all).await;
            }

            let message = compose_draft(&draft, address, &no_fields, &sender)?;
            if let Err(e) = self.mailer.deliver(&message, credentials).await {
                log::error!("Error sending email to {address}: {e}");
                return Err(e.into());
            }
            log::info!("Email sent successfully to {address}");
        }

        Ok(addresses.len())
    }

    /// [`Self::start_campaign`] mapped onto the control wire reply.
    pub fn start_campaign_reply(&self, owner_id: OwnerId) -> StartCampaignReply {
        match self.start_campaign(owner_id) {
            Ok(_) => StartCampaignReply {
                accepted: true,
                reason: None,
            },
            Err(e) => {
                log::warn!("Campaign for account {owner_id} rejected: {e}");
                StartCampaignReply {
                    accepted: false,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    /// [`Self::send_now`] mapped onto the control wire reply.
    pub async fn send_now_reply(
        &self,
        owner_id: OwnerId,
        request: &SendEmailRequest,
    ) -> SendEmailReply {
        match self.send_now(owner_id, request).await {
            Ok(_) => SendEmailReply {
                success: true,
                error: None,
            },
            Err(e) => SendEmailReply {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}
