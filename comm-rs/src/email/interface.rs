//! Email protocol interface
//!
//! Owns the transport registry and the assembler. `with(name)` returns a
//! cheap clone pinned to a transport, keeping `send` reentrant-safe under
//! concurrent calls; `send` fans out one transport attempt per data item
//! and fans the per-recipient outcomes back into a single report.

use crate::config::EmailConfig;
use crate::error::{CommError, Result};
use crate::i18n::I18n;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::assembler::EmailAssembler;
use super::message::{validate_email, OutboundEmail, SendRequest};
use super::receiver::{EmailReceiver, InboundEmail};
use super::transport::TransportRegistry;
use super::DataItem;

/// Aggregate of one `send` call. Address lists keep duplicates: a
/// recipient appearing in several envelopes is reported once per attempt.
#[derive(Debug, Clone, Default)]
pub struct SendReport {
    pub failed: Vec<String>,
    pub succeeded: Vec<String>,
}

#[derive(Clone)]
pub struct EmailInterface {
    config: Arc<EmailConfig>,
    registry: Option<Arc<TransportRegistry>>,
    assembler: Arc<EmailAssembler>,
    /// Transport pinned by `with`; `None` means the registry default.
    transport: Option<String>,
}

impl EmailInterface {
    pub async fn new(config: EmailConfig) -> Result<Self> {
        let registry = match &config.sender {
            Some(sender) => Some(TransportRegistry::from_config(sender).await?),
            None => None,
        };
        Self::with_registry(config, registry)
    }

    /// Construct with an explicit registry (or none for receive-only).
    /// Tests use this to inject scripted backends.
    pub fn with_registry(
        config: EmailConfig,
        registry: Option<TransportRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let i18n = Arc::new(I18n::load(
            &config.templates_dir.join("locales"),
            &config.default_lang,
        )?);
        let assembler = Arc::new(EmailAssembler::new(&config, i18n));
        Ok(Self {
            config: Arc::new(config),
            registry: registry.map(Arc::new),
            assembler,
            transport: None,
        })
    }

    /// Pin a transport for sends issued through the returned handle.
    /// Unknown names and `*` fall back to the default at dispatch time.
    pub fn with<S: Into<String>>(&self, transport: S) -> Self {
        let mut bound = self.clone();
        bound.transport = Some(transport.into());
        bound
    }

    /// Assemble and dispatch one envelope per data item.
    ///
    /// Assembly failures abort before any transport attempt. Transport
    /// failures are per-envelope: they surface in `SendReport::failed`
    /// and never abort sibling sends. The report is returned only after
    /// every attempt has completed.
    pub async fn send(&self, settings: &SendRequest, data: Vec<DataItem>) -> Result<SendReport> {
        validate_email(&settings.from)?;
        if settings.to.is_empty() {
            return Err(CommError::InvalidArgument(
                "send requires at least one recipient".to_string(),
            ));
        }
        for recipient in &settings.to {
            validate_email(recipient)?;
        }

        let registry = self.registry.as_ref().ok_or_else(|| {
            CommError::Config("email sender is not configured".to_string())
        })?;
        // Call-level failure: an unresolvable transport fails the whole
        // call before any attempt.
        let backend = registry.resolve(self.transport.as_deref())?;

        let envelopes = self.assembler.assemble(settings, &data).await?;
        let emails: Vec<OutboundEmail> = envelopes
            .into_iter()
            .map(|envelope| OutboundEmail::from_parts(settings, envelope))
            .collect();

        debug!(
            "Dispatching {} envelope(s) via '{}'",
            emails.len(),
            backend.name()
        );

        let attempts = emails.iter().map(|email| {
            let backend = Arc::clone(&backend);
            async move { (email.recipients(), backend.send_mail(email).await) }
        });
        let results = futures::future::join_all(attempts).await;

        let mut report = SendReport::default();
        for (recipients, result) in results {
            match result {
                Ok(outcome) => {
                    report.succeeded.extend(outcome.accepted);
                    report.failed.extend(outcome.rejected);
                    // indeterminate is conservatively a failure
                    report.failed.extend(outcome.pending);
                }
                Err(CommError::Transport {
                    message,
                    recipients: reported,
                }) => {
                    warn!("Transport attempt failed: {}", message);
                    if reported.is_empty() {
                        report.failed.extend(recipients);
                    } else {
                        report.failed.extend(reported);
                    }
                }
                Err(e) => {
                    warn!("Transport attempt failed: {}", e);
                    report.failed.extend(recipients);
                }
            }
        }

        info!(
            "Send complete: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Convenience for the single-item case.
    pub async fn send_one(&self, settings: &SendRequest, item: DataItem) -> Result<SendReport> {
        self.send(settings, vec![item]).await
    }

    /// Boot the inbound SMTP listener and stream parsed messages.
    pub async fn receive(&self) -> Result<mpsc::Receiver<InboundEmail>> {
        let receiver_config = self.config.receiver.clone().ok_or_else(|| {
            CommError::Config("email receiver is not configured".to_string())
        })?;
        let receiver = EmailReceiver::bind(receiver_config).await?;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(receiver.run(tx));
        Ok(rx)
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }
}
