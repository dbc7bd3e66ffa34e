pub mod control;
pub mod message_builder;
pub mod runner;

use std::sync::Arc;

use crate::config::Settings;
use crate::db::establish_connection_pool;
use crate::errors::Error;
use crate::models::zmq::{ControlReply, ControlRequest};
use crate::repository::DieselRepository;
use crate::transport::RelayMailer;

use control::CampaignControl;

/// Entry point for the campaign worker.
///
/// Serves [`ControlRequest`]s on a ZeroMQ `REP` socket, one at a time.
pub async fn run(settings: Settings) -> Result<(), Error> {
    let db_pool = establish_connection_pool(&settings.database_url)?;
    let repo = DieselRepository::new(db_pool);
    let mailer = RelayMailer::from_settings(&settings.relay)?;
    let control = CampaignControl::new(repo, Arc::new(mailer));

    let context = zmq::Context::new();
    let responder = context.socket(zmq::REP)?;
    responder.bind(&settings.zmq_address)?;

    log::info!(
        "Starting campaign worker on {} (relay {}:{})",
        settings.zmq_address,
        settings.relay.host,
        settings.relay.port
    );

    loop {
        let msg = tokio::task::block_in_place(|| responder.recv_bytes(0))?;
        let reply = match serde_json::from_slice::<ControlRequest>(&msg) {
            Ok(request) => handle_request(&control, request).await,
            Err(e) => {
                log::error!("Error receiving message: {e}");
                ControlReply::malformed(&msg, &e)
            }
        };
        let payload = serde_json::to_vec(&reply)?;
        tokio::task::block_in_place(|| responder.send(payload, 0))?;
    }
}

async fn handle_request(
    control: &CampaignControl<DieselRepository, RelayMailer>,
    request: ControlRequest,
) -> ControlReply {
    match request {
        ControlRequest::StartCampaign { owner_id } => {
            ControlReply::StartCampaign(control.start_campaign_reply(owner_id))
        }
        ControlRequest::SendEmail { owner_id, request } => {
            log::info!(
                "Sending ad-hoc email for account {owner_id} (send_to_all: {})",
                request.send_to_all
            );
            ControlReply::SendEmail(control.send_now_reply(owner_id, &request).await)
        }
    }
}
