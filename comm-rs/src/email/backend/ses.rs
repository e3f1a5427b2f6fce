//! AWS SES v2 backend
//!
//! Sends the fully built MIME message through the SES raw-message API so
//! attachments and extra headers survive intact. Credentials come from
//! the SDK default provider chain.

use crate::config::SesConfig;
use crate::error::{CommError, Result};
use async_trait::async_trait;
use aws_sdk_sesv2::primitives::Blob;
use aws_sdk_sesv2::types::{Destination, EmailContent, RawMessage};
use aws_sdk_sesv2::Client;
use tracing::info;

use super::super::message::OutboundEmail;
use super::super::transport::{SendOutcome, Transport};

pub struct SesBackend {
    client: Client,
}

impl SesBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS configuration, honoring the
    /// optional region override.
    pub async fn from_env(config: SesConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        Ok(Self::new(Client::new(&sdk_config)))
    }
}

#[async_trait]
impl Transport for SesBackend {
    fn name(&self) -> &'static str {
        "ses"
    }

    async fn send_mail(&self, email: &OutboundEmail) -> Result<SendOutcome> {
        let mime = email.to_mime().await?;

        let raw = RawMessage::builder()
            .data(Blob::new(mime))
            .build()
            .map_err(|e| CommError::transport(format!("failed to build raw message: {}", e)))?;
        let content = EmailContent::builder().raw(raw).build();

        let mut destination = Destination::builder();
        for to in &email.to {
            destination = destination.to_addresses(to);
        }
        for cc in &email.cc {
            destination = destination.cc_addresses(cc);
        }
        for bcc in &email.bcc {
            destination = destination.bcc_addresses(bcc);
        }

        let response = self
            .client
            .send_email()
            .from_email_address(&email.from)
            .destination(destination.build())
            .content(content)
            .send()
            .await
            .map_err(|e| {
                CommError::transport_for(format!("SES send failed: {}", e), email.recipients())
            })?;

        info!(
            "SES accepted message (id: {})",
            response.message_id().unwrap_or("unknown")
        );
        Ok(SendOutcome::accepted_all(email))
    }
}
