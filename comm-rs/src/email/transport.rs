//! Transport abstraction and registry
//!
//! Backends are configured once and shared read-only. Per-send selection
//! resolves a name against the registry; unknown names and the `*`
//! wildcard fall back to the configured default.

use crate::config::SenderConfig;
use crate::error::{CommError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::backend::direct::DirectBackend;
use super::backend::sendmail::SendmailBackend;
use super::backend::ses::SesBackend;
use super::backend::stub::StubBackend;
use super::message::OutboundEmail;

/// Per-send result reported by a backend. `pending` covers addresses the
/// backend left indeterminate; the aggregation counts them as failed.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub pending: Vec<String>,
}

impl SendOutcome {
    /// Every recipient accepted.
    pub fn accepted_all(email: &OutboundEmail) -> Self {
        Self {
            accepted: email.recipients(),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hand one assembled envelope to the delivery system.
    async fn send_mail(&self, email: &OutboundEmail) -> Result<SendOutcome>;
}

pub struct TransportRegistry {
    backends: HashMap<String, Arc<dyn Transport>>,
    default: String,
}

impl TransportRegistry {
    pub fn new<S: Into<String>>(default: S) -> Self {
        Self {
            backends: HashMap::new(),
            default: default.into(),
        }
    }

    pub fn register(&mut self, backend: Arc<dyn Transport>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Build the registry from config. The default transport is the
    /// configured one, or the first configured backend.
    pub async fn from_config(config: &SenderConfig) -> Result<Self> {
        let configured = config.configured_backends();
        let default = config
            .default_transport
            .clone()
            .or_else(|| configured.first().map(|n| n.to_string()))
            .ok_or_else(|| {
                CommError::Config("no transport backend configured".to_string())
            })?;

        let mut registry = Self::new(default);
        if let Some(direct) = &config.direct {
            registry.register(Arc::new(DirectBackend::new(direct.clone())));
        }
        if let Some(sendmail) = &config.sendmail {
            registry.register(Arc::new(SendmailBackend::new(sendmail.clone())));
        }
        if let Some(ses) = &config.ses {
            registry.register(Arc::new(SesBackend::from_env(ses.clone()).await?));
        }
        if config.stub.is_some() {
            registry.register(Arc::new(StubBackend::new()));
        }

        info!(
            "Transport registry ready: {:?} (default: {})",
            registry.backends.keys().collect::<Vec<_>>(),
            registry.default
        );
        Ok(registry)
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Resolve a backend name. `None`, `*`, and unconfigured names all
    /// map to the default backend.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn Transport>> {
        let requested = match name {
            Some("*") | None => self.default.as_str(),
            Some(other) => other,
        };
        if let Some(backend) = self.backends.get(requested) {
            return Ok(Arc::clone(backend));
        }
        debug!(
            "Transport '{}' not configured, falling back to '{}'",
            requested, self.default
        );
        self.backends
            .get(&self.default)
            .map(Arc::clone)
            .ok_or_else(|| {
                CommError::Config(format!(
                    "default transport '{}' has no backend",
                    self.default
                ))
            })
    }
}
