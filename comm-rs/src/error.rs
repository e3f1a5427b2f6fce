use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        /// Per-address failures reported by the backend, when it knows them.
        recipients: Vec<String>,
    },

    #[error("SMTP protocol error: {0}")]
    SmtpProtocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("DNS lookup failed: {0}")]
    DnsLookup(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommError {
    /// Transport failure without per-address detail.
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
            recipients: Vec::new(),
        }
    }

    /// Transport failure carrying the addresses it affected.
    pub fn transport_for<T: Into<String>>(message: T, recipients: Vec<String>) -> Self {
        Self::Transport {
            message: message.into(),
            recipients,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommError>;
