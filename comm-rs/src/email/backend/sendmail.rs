//! Local sendmail delivery

use crate::config::SendmailConfig;
use crate::error::{CommError, Result};
use async_trait::async_trait;
use lettre::{AsyncSendmailTransport, AsyncTransport, Tokio1Executor};
use tracing::info;

use super::super::message::OutboundEmail;
use super::super::transport::{SendOutcome, Transport};

pub struct SendmailBackend {
    transport: AsyncSendmailTransport<Tokio1Executor>,
}

impl SendmailBackend {
    pub fn new(config: SendmailConfig) -> Self {
        let transport = match config.path {
            Some(path) => AsyncSendmailTransport::new_with_command(path),
            None => AsyncSendmailTransport::new(),
        };
        Self { transport }
    }
}

#[async_trait]
impl Transport for SendmailBackend {
    fn name(&self) -> &'static str {
        "sendmail"
    }

    async fn send_mail(&self, email: &OutboundEmail) -> Result<SendOutcome> {
        let mime = email.to_mime().await?;
        let envelope = email.smtp_envelope()?;

        self.transport
            .send_raw(&envelope, &mime)
            .await
            .map_err(|e| {
                CommError::transport_for(
                    format!("sendmail failed: {}", e),
                    email.recipients(),
                )
            })?;

        info!("sendmail accepted message for {} recipient(s)", email.recipients().len());
        Ok(SendOutcome::accepted_all(email))
    }
}
