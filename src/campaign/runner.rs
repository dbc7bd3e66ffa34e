//! The campaign dispatch loop.
//!
//! A campaign walks the owner's pending recipients strictly one at a time:
//! re-check the stored state, compose, deliver, persist. A failed attempt is
//! logged and the loop moves on; nothing is retried within the same run.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use crate::domain::types::{OwnerId, RecipientId};
use crate::domain::{Account, Credentials, Recipient, Template};
use crate::errors::{Error, PreconditionError};
use crate::repository::{AccountReader, RecipientReader, RecipientWriter, TemplateReader};
use crate::transport::Mailer;

use super::message_builder::{Sender, compose};

/// Wait between two consecutive campaign deliveries.
pub const CAMPAIGN_PACING: Duration = Duration::from_secs(120);

/// Wait between two consecutive deliveries of a synchronous send-to-all.
pub const SEND_ALL_PACING: Duration = Duration::from_secs(2);

/// Delays enforced between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub campaign: Duration,
    pub send_all: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            campaign: CAMPAIGN_PACING,
            send_all: SEND_ALL_PACING,
        }
    }
}

/// Everything the dispatch loop needs, resolved while loading.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub owner: Account,
    pub credentials: Credentials,
    pub template: Template,
    pub recipients: Vec<Recipient>,
}

/// Result of the loading phase.
#[derive(Debug)]
pub enum Loaded {
    Ready(Campaign),
    /// Nothing is pending; starting is a successful no-op.
    NothingPending,
}

impl Campaign {
    /// Resolves credentials, template and pending recipients for `owner_id`.
    pub fn load<R>(repo: &R, owner_id: OwnerId) -> Result<Loaded, Error>
    where
        R: AccountReader + TemplateReader + RecipientReader,
    {
        log::debug!("Campaign for account {owner_id}: {:?}", CampaignState::Loading);
        let owner = repo
            .get_account_by_id(owner_id)?
            .ok_or(PreconditionError::OwnerNotFound(owner_id))?;
        let credentials = owner
            .credentials
            .clone()
            .ok_or(PreconditionError::MissingCredentials(owner_id))?;
        let template = repo
            .get_template(owner_id)?
            .ok_or(PreconditionError::MissingTemplate(owner_id))?;
        let recipients = repo.list_pending(owner_id)?;

        if recipients.is_empty() {
            return Ok(Loaded::NothingPending);
        }

        Ok(Loaded::Ready(Campaign {
            owner,
            credentials,
            template,
            recipients,
        }))
    }
}

/// Where the dispatch loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignState {
    Loading,
    Dispatching(usize),
    Completed,
}

/// Per-run counters, used for logging only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Delivered but the `Sent` state could not be stored.
    pub unrecorded: usize,
}

impl CampaignReport {
    fn skip(&mut self, recipient: &Recipient, reason: &str) {
        log::info!("Skipping {} ({reason})", recipient.email_address);
        self.skipped += 1;
    }
}

enum Recheck {
    Send,
    Skip(&'static str),
}

fn recheck<R: RecipientReader>(repo: &R, id: RecipientId) -> Recheck {
    match repo.get_recipient_by_id(id) {
        Ok(Some(current)) if current.delivery_state.is_sent() => Recheck::Skip("already sent"),
        Ok(Some(_)) => Recheck::Send,
        Ok(None) => Recheck::Skip("no longer exists"),
        Err(e) => {
            log::error!("Cannot re-check recipient {id}: {e}");
            Recheck::Skip("state unavailable")
        }
    }
}

/// Runs the dispatch loop to completion. Never aborts early.
pub async fn run_campaign<R, M>(
    campaign: Campaign,
    repo: &R,
    mailer: &M,
    pacing: Duration,
) -> CampaignReport
where
    R: RecipientReader + RecipientWriter,
    M: Mailer + ?Sized,
{
    let owner_id = campaign.owner.id;
    let sender = Sender {
        name: campaign.owner.display_name.as_str(),
        address: campaign.credentials.sender_address.as_str(),
    };
    let mut report = CampaignReport::default();
    let mut last_attempt: Option<Instant> = None;

    log::info!(
        "Starting campaign for account {owner_id} with {} pending recipients",
        campaign.recipients.len()
    );

    for (index, recipient) in campaign.recipients.iter().enumerate() {
        log::debug!(
            "Campaign for account {owner_id}: {:?}",
            CampaignState::Dispatching(index)
        );

        // recipients handled elsewhere are dropped without waiting
        if let Recheck::Skip(reason) = recheck(repo, recipient.id) {
            report.skip(recipient, reason);
            continue;
        }

        let due = last_attempt.map(|finished_at| finished_at + pacing);
        if let Some(due) = due.filter(|due| Instant::now() < *due) {
            sleep_until(due).await;
            if let Recheck::Skip(reason) = recheck(repo, recipient.id) {
                report.skip(recipient, reason);
                continue;
            }
        }

        let message = match compose(&campaign.template, recipient, &sender) {
            Ok(message) => message,
            Err(e) => {
                log::error!("Cannot compose email to {}: {e}", recipient.email_address);
                report.failed += 1;
                last_attempt = Some(Instant::now());
                continue;
            }
        };

        let outcome = mailer.deliver(&message, &campaign.credentials).await;
        last_attempt = Some(Instant::now());

        if let Err(e) = outcome {
            log::error!("Failed to send email to {}: {e}", recipient.email_address);
            report.failed += 1;
            continue;
        }

        log::info!("Email sent successfully to {}", recipient.email_address);
        report.sent += 1;

        if let Err(e) = repo.mark_sent(recipient.id) {
            log::error!(
                "Failed to update sent status for recipient {}: {}",
                recipient.id,
                e
            );
            report.unrecorded += 1;
        }
    }

    log::info!(
        "Campaign for account {owner_id} {:?}: {} sent, {} failed, {} skipped, {} unrecorded",
        CampaignState::Completed,
        report.sent,
        report.failed,
        report.skipped,
        report.unrecorded
    );

    report
}
