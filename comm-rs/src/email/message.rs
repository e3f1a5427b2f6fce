//! Outbound message model and MIME generation
//!
//! A [`SendRequest`] describes one send call (addressing + template type);
//! the assembler merges it with a rendered envelope into an
//! [`OutboundEmail`], which every backend consumes. MIME bytes are built
//! with mail-builder: multipart alternative bodies, inline attachments by
//! Content-ID, and caller-supplied extra headers.

use crate::error::{CommError, Result};
use mail_builder::headers::address::Address;
use mail_builder::headers::text::Text;
use mail_builder::MessageBuilder;
use serde::{Deserialize, Serialize};

use super::assembler::RenderedEnvelope;
use super::attachments::{AttachmentRef, ResolvedAttachment};

/// One send call: addressing plus the template type to render.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SendRequest {
    pub from: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    /// Literal subject; when present, subject templating is skipped.
    pub subject: Option<String>,
    /// Template bundle name (selects content/subject/attachments subtrees).
    pub template_type: String,
    /// Language for localized rendering; defaults to the configured one.
    pub lang: Option<String>,
    /// Extra headers passed through verbatim.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// When present, `" (ref:<ref_tag>)"` is appended to every subject.
    pub ref_tag: Option<String>,
}

impl SendRequest {
    pub fn new<F, T>(from: F, to: Vec<String>, template_type: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        Self {
            from: from.into(),
            to,
            template_type: template_type.into(),
            ..Self::default()
        }
    }
}

/// Fully assembled message, ready for a transport backend.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub uid: usize,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub headers: Vec<(String, String)>,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub attachments: Vec<ResolvedAttachment>,
}

impl OutboundEmail {
    /// Merge a rendered envelope onto its originating request.
    pub fn from_parts(settings: &SendRequest, envelope: RenderedEnvelope) -> Self {
        Self {
            uid: envelope.uid,
            from: settings.from.clone(),
            to: settings.to.clone(),
            cc: settings.cc.clone(),
            bcc: settings.bcc.clone(),
            reply_to: settings.reply_to.clone(),
            in_reply_to: settings.in_reply_to.clone(),
            references: settings.references.clone(),
            headers: settings.headers.clone(),
            subject: envelope.subject,
            html: envelope.html,
            text: envelope.text,
            attachments: envelope.attachments,
        }
    }

    /// All envelope recipients (to + cc + bcc).
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .cloned()
            .collect()
    }

    /// Build the raw MIME message.
    ///
    /// Attachments referenced from the HTML body as `cid:<cid>` become
    /// inline parts; everything else is a regular attachment.
    pub async fn to_mime(&self) -> Result<Vec<u8>> {
        let mut builder = MessageBuilder::new()
            .from(Address::new_address(None::<&str>, self.from.clone()))
            .to(address_list(&self.to))
            .subject(self.subject.clone());

        if !self.cc.is_empty() {
            builder = builder.cc(address_list(&self.cc));
        }
        if !self.bcc.is_empty() {
            builder = builder.bcc(address_list(&self.bcc));
        }
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(Address::new_address(None::<&str>, reply_to.clone()));
        }
        if let Some(in_reply_to) = &self.in_reply_to {
            builder = builder.header("In-Reply-To", Text::new(in_reply_to.clone()));
        }
        if let Some(references) = &self.references {
            builder = builder.header("References", Text::new(references.clone()));
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.clone(), Text::new(value.clone()));
        }

        builder = builder.html_body(self.html.clone());
        if !self.text.is_empty() {
            builder = builder.text_body(self.text.clone());
        }

        for attachment in &self.attachments {
            let contents =
                tokio::fs::read(&attachment.path)
                    .await
                    .map_err(|e| CommError::Filesystem {
                        path: attachment.path.clone(),
                        source: e,
                    })?;
            let content_type = content_type_for(&attachment.filename);
            let inline_marker = format!("cid:{}", attachment.cid);
            if self.html.contains(&inline_marker) {
                builder = builder.inline(content_type, attachment.cid.clone(), contents);
            } else {
                builder = builder.attachment(content_type, attachment.filename.clone(), contents);
            }
        }

        builder
            .write_to_vec()
            .map_err(|e| CommError::Parse(format!("MIME generation failed: {}", e)))
    }

    /// SMTP envelope (sender + all recipients) for raw transports.
    pub fn smtp_envelope(&self) -> Result<lettre::address::Envelope> {
        let from = self
            .from
            .parse()
            .map_err(|_| CommError::InvalidEmail(self.from.clone()))?;
        let rcpts = self
            .recipients()
            .iter()
            .map(|r| r.parse().map_err(|_| CommError::InvalidEmail(r.clone())))
            .collect::<Result<Vec<_>>>()?;
        lettre::address::Envelope::new(Some(from), rcpts)
            .map_err(|e| CommError::InvalidEmail(e.to_string()))
    }
}

fn address_list(addresses: &[String]) -> Address<'static> {
    Address::new_list(
        addresses
            .iter()
            .map(|a| Address::new_address(None::<&str>, a.clone()))
            .collect(),
    )
}

/// Content type by extension; unknown extensions fall back to octet-stream.
fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(|e| e.to_ascii_lowercase()) {
        Some(ext) => match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "pdf" => "application/pdf",
            "txt" => "text/plain",
            "html" | "htm" => "text/html",
            "csv" => "text/csv",
            "ics" => "text/calendar",
            "zip" => "application/zip",
            _ => "application/octet-stream",
        },
        None => "application/octet-stream",
    }
}

/// Basic email validation
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(CommError::InvalidEmail("email is empty".to_string()));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(CommError::InvalidEmail(email.to_string()));
    }

    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(CommError::InvalidEmail(email.to_string()));
    }

    Ok(())
}
