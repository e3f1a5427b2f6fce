//! Direct-to-MX delivery
//!
//! Recipients are grouped by domain; each domain's MX hosts are tried in
//! priority order with a plain SMTP handshake. A domain whose hosts all
//! fail marks its recipients rejected without affecting other domains.

use crate::config::DirectConfig;
use crate::error::{CommError, Result};
use async_trait::async_trait;
use lettre::transport::smtp::extension::ClientId;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::super::dns::lookup_mx;
use super::super::message::OutboundEmail;
use super::super::transport::{SendOutcome, Transport};

pub struct DirectBackend {
    config: DirectConfig,
}

impl DirectBackend {
    pub fn new(config: DirectConfig) -> Self {
        Self { config }
    }

    fn helo_name(&self) -> String {
        self.config
            .helo_name
            .clone()
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().to_string())
    }

    /// Try each MX host for a domain in priority order.
    async fn deliver_domain(
        &self,
        domain: &str,
        envelope: &lettre::address::Envelope,
        mime: &[u8],
    ) -> Result<()> {
        let servers = lookup_mx(domain).await?;
        let mut last_error = None;

        for server in &servers {
            debug!("Attempting delivery to {} via {}", domain, server);
            let transport: AsyncSmtpTransport<Tokio1Executor> =
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server.as_str())
                    .port(self.config.port)
                    .hello_name(ClientId::Domain(self.helo_name()))
                    .build();

            match transport.send_raw(envelope, mime).await {
                Ok(_) => {
                    info!("Delivered to {} via {}", domain, server);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Delivery to {} via {} failed: {}", domain, server, e);
                    last_error = Some(e);
                }
            }
        }

        Err(CommError::transport(format!(
            "all MX hosts failed for {}: {}",
            domain,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no MX hosts".to_string())
        )))
    }
}

#[async_trait]
impl Transport for DirectBackend {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn send_mail(&self, email: &OutboundEmail) -> Result<SendOutcome> {
        let mime = email.to_mime().await?;
        let from: lettre::Address = email
            .from
            .parse()
            .map_err(|_| CommError::InvalidEmail(email.from.clone()))?;

        // Group recipients by domain; BTreeMap keeps attempt order stable.
        let mut by_domain: BTreeMap<String, Vec<lettre::Address>> = BTreeMap::new();
        let mut originals: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for recipient in email.recipients() {
            let address: lettre::Address = recipient
                .parse()
                .map_err(|_| CommError::InvalidEmail(recipient.clone()))?;
            let domain = address.domain().to_string();
            by_domain.entry(domain.clone()).or_default().push(address);
            originals.entry(domain).or_default().push(recipient);
        }

        let mut outcome = SendOutcome::default();
        for (domain, addresses) in by_domain {
            let envelope =
                lettre::address::Envelope::new(Some(from.clone()), addresses)
                    .map_err(|e| CommError::InvalidEmail(e.to_string()))?;
            let recipients = originals.remove(&domain).unwrap_or_default();
            match self.deliver_domain(&domain, &envelope, &mime).await {
                Ok(()) => outcome.accepted.extend(recipients),
                Err(e) => {
                    warn!("Rejecting recipients for {}: {}", domain, e);
                    outcome.rejected.extend(recipients);
                }
            }
        }
        Ok(outcome)
    }
}
