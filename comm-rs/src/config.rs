use crate::error::{CommError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Email protocol configuration. Omitting it disables email entirely.
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub sender: Option<SenderConfig>,
    pub receiver: Option<ReceiverConfig>,
    /// Root of the on-disk template layout:
    /// `content/<type>/`, `subject/<type>/`, `attachments/<type>/`, `locales/`.
    pub templates_dir: PathBuf,
    /// Overrides `<templates_dir>/attachments` as the attachment root.
    pub attachments_path: Option<PathBuf>,
    #[serde(default = "default_lang")]
    pub default_lang: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SenderConfig {
    /// Backend used when a send does not pin one, pins `*`, or pins an
    /// unconfigured name. Defaults to the first configured backend.
    pub default_transport: Option<String>,
    pub direct: Option<DirectConfig>,
    pub sendmail: Option<SendmailConfig>,
    pub ses: Option<SesConfig>,
    pub stub: Option<StubConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DirectConfig {
    /// Name announced in EHLO. Defaults to the local hostname.
    pub helo_name: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SendmailConfig {
    /// Path to the sendmail binary. Defaults to the system sendmail.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SesConfig {
    /// AWS region override; credentials come from the SDK default chain.
    pub region: Option<String>,
}

/// Presence enables the in-memory stub backend (accepts everything).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StubConfig {}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiverConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Greeting banner text. Defaults to the local hostname.
    pub banner: Option<String>,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Reject MAIL FROM whose domain has no MX/A record.
    #[serde(default)]
    pub validate_sender_dns: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            banner: None,
            max_message_size: default_max_message_size(),
            validate_sender_dns: false,
        }
    }
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_listen_addr() -> String {
    "0.0.0.0:25".to_string()
}

fn default_max_message_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CommError::Config(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| CommError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(email) = &self.email {
            email.validate()?;
        }
        Ok(())
    }
}

impl EmailConfig {
    pub fn new<P: Into<PathBuf>>(templates_dir: P) -> Self {
        Self {
            sender: None,
            receiver: None,
            templates_dir: templates_dir.into(),
            attachments_path: None,
            default_lang: default_lang(),
        }
    }

    /// Attachment root: explicit override or `<templates_dir>/attachments`.
    pub fn attachments_dir(&self) -> PathBuf {
        self.attachments_path
            .clone()
            .unwrap_or_else(|| self.templates_dir.join("attachments"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.templates_dir.as_os_str().is_empty() {
            return Err(CommError::Config("templates_dir must be set".to_string()));
        }

        if let Some(sender) = &self.sender {
            let configured = sender.configured_backends();
            if configured.is_empty() {
                return Err(CommError::Config(
                    "sender section requires at least one transport backend".to_string(),
                ));
            }
            if let Some(default) = &sender.default_transport {
                if !configured.contains(&default.as_str()) {
                    return Err(CommError::Config(format!(
                        "default_transport '{}' is not a configured backend",
                        default
                    )));
                }
            }
        }

        Ok(())
    }
}

impl SenderConfig {
    /// Names of the backends this config enables, in registration order.
    pub fn configured_backends(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.direct.is_some() {
            names.push("direct");
        }
        if self.sendmail.is_some() {
            names.push("sendmail");
        }
        if self.ses.is_some() {
            names.push("ses");
        }
        if self.stub.is_some() {
            names.push("stub");
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [email]
            templates_dir = "/srv/templates"

            [email.sender]
            stub = {}
            "#,
        )
        .unwrap();

        let email = config.email.unwrap();
        assert_eq!(email.templates_dir, PathBuf::from("/srv/templates"));
        assert_eq!(email.default_lang, "en");
        assert_eq!(
            email.attachments_dir(),
            PathBuf::from("/srv/templates/attachments")
        );
        assert_eq!(
            email.sender.unwrap().configured_backends(),
            vec!["stub"]
        );
    }

    #[test]
    fn test_omitting_email_disables_protocol() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.email.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_transport_must_be_configured() {
        let config: Config = toml::from_str(
            r#"
            [email]
            templates_dir = "/srv/templates"

            [email.sender]
            default_transport = "ses"
            stub = {}
            "#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_receiver_defaults() {
        let config: Config = toml::from_str(
            r#"
            [email]
            templates_dir = "/srv/templates"

            [email.receiver]
            "#,
        )
        .unwrap();

        let receiver = config.email.unwrap().receiver.unwrap();
        assert_eq!(receiver.listen_addr, "0.0.0.0:25");
        assert_eq!(receiver.max_message_size, 10 * 1024 * 1024);
        assert!(!receiver.validate_sender_dns);
    }
}
