use async_trait::async_trait;
use mail_send::SmtpClientBuilder;

use crate::campaign::message_builder::ComposedMessage;
use crate::config::RelaySettings;
use crate::domain::Credentials;

use super::{Mailer, Stage, TransportError};

/// Simple SMTP mailer that leverages [`mail_send`] for single messages.
pub struct DialMailer {
    settings: RelaySettings,
}

impl DialMailer {
    pub fn new(settings: RelaySettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Mailer for DialMailer {
    async fn deliver(
        &self,
        message: &ComposedMessage,
        credentials: &Credentials,
    ) -> Result<(), TransportError> {
        let login = (
            credentials.sender_address.as_str(),
            credentials.sender_secret.as_str(),
        );

        SmtpClientBuilder::new(self.settings.host.as_str(), self.settings.port)
            .implicit_tls(true)
            .timeout(self.settings.connect_timeout())
            .credentials(login)
            .connect()
            .await
            .map_err(|e| TransportError::new(Stage::Dial, e))?
            .send(message.builder())
            .await
            .map_err(|e| TransportError::new(Stage::Dial, e))?;
        Ok(())
    }
}
