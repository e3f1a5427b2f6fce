//! Top-level communication facade
//!
//! One `Communications` value is constructed at startup from a [`Config`]
//! and passed by reference to call sites; there is no hidden global
//! instance. Protocols are addressed by name — `email` today, with room
//! for others (`sms`) later.

use crate::config::Config;
use crate::email::EmailInterface;
use crate::error::Result;
use tracing::info;

pub struct Communications {
    email: Option<EmailInterface>,
}

impl Communications {
    /// Build every configured protocol interface. Omitted sections
    /// disable their protocol.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let email = match config.email {
            Some(email_config) => Some(EmailInterface::new(email_config).await?),
            None => None,
        };
        info!(
            "Communications ready (email: {})",
            if email.is_some() { "on" } else { "off" }
        );
        Ok(Self { email })
    }

    /// Assemble from pre-built interfaces (used by tests to inject
    /// scripted transports).
    pub fn from_parts(email: Option<EmailInterface>) -> Self {
        Self { email }
    }

    /// Look up a protocol interface, optionally pinned to a transport.
    /// Returns `None` when the protocol is not configured.
    pub fn with(&self, protocol: &str, transport: Option<&str>) -> Option<EmailInterface> {
        match protocol {
            "email" => self.email.as_ref().map(|interface| match transport {
                Some(name) => interface.with(name),
                None => interface.clone(),
            }),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&EmailInterface> {
        self.email.as_ref()
    }
}
