//! Envelope assembly orchestration
//!
//! `assemble` turns one send request plus N data items into N complete
//! envelopes. Three branches run concurrently: batched content rendering,
//! subject resolution (a literal subject bypasses templating), and
//! attachment discovery. Branch outputs meet in a per-uid accumulator
//! whose merge is commutative; each branch contributes disjoint fields
//! and a completed entry is emitted and dropped immediately. The first
//! branch error aborts the whole assembly.

use crate::config::EmailConfig;
use crate::error::{CommError, Result};
use crate::i18n::I18n;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::attachments::{AttachmentResolver, ResolvedAttachment};
use super::message::SendRequest;
use super::templates::TemplateRenderer;
use super::DataItem;

/// One fully rendered envelope, tagged with its data item's position.
#[derive(Debug, Clone)]
pub struct RenderedEnvelope {
    pub uid: usize,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub attachments: Vec<ResolvedAttachment>,
}

pub struct EmailAssembler {
    renderer: TemplateRenderer,
    attachments: AttachmentResolver,
    default_lang: String,
}

impl EmailAssembler {
    pub fn new(config: &EmailConfig, i18n: Arc<I18n>) -> Self {
        Self {
            renderer: TemplateRenderer::new(&config.templates_dir, i18n),
            attachments: AttachmentResolver::new(config.attachments_dir()),
            default_lang: config.default_lang.clone(),
        }
    }

    /// Assemble one envelope per data item. Fails fast: no partial
    /// envelopes survive an error in any branch.
    pub async fn assemble(
        &self,
        settings: &SendRequest,
        data: &[DataItem],
    ) -> Result<Vec<RenderedEnvelope>> {
        if data.is_empty() {
            return Err(CommError::InvalidArgument(
                "send requires at least one data item".to_string(),
            ));
        }

        let lang = settings
            .lang
            .clone()
            .unwrap_or_else(|| self.default_lang.clone());

        let (contents, subjects, attachments) = tokio::try_join!(
            self.renderer
                .render_content(&settings.template_type, &lang, data),
            self.resolve_subjects(settings, &lang, data),
            self.attachments
                .resolve(&settings.template_type, &settings.attachments),
        )?;

        let mut accumulator = EnvelopeAccumulator::new(data.len());
        for content in contents {
            accumulator.put_content(content.uid, content.html, content.text);
        }
        for (uid, subject) in subjects {
            accumulator.put_subject(uid, subject);
        }
        accumulator.put_attachments(attachments);

        let mut envelopes = accumulator.finish()?;

        if let Some(tag) = &settings.ref_tag {
            for envelope in &mut envelopes {
                envelope.subject.push_str(&format!(" (ref:{})", tag));
            }
        }

        debug!(
            "Assembled {} envelope(s) for '{}'",
            envelopes.len(),
            settings.template_type
        );
        Ok(envelopes)
    }

    /// A literal subject applies to every item without templating;
    /// otherwise the subject bundle is rendered per item.
    async fn resolve_subjects(
        &self,
        settings: &SendRequest,
        lang: &str,
        data: &[DataItem],
    ) -> Result<Vec<(usize, String)>> {
        if let Some(literal) = &settings.subject {
            return Ok((0..data.len()).map(|uid| (uid, literal.clone())).collect());
        }
        self.renderer
            .render_subjects(&settings.template_type, lang, data)
            .await
    }
}

#[derive(Default)]
struct Slot {
    content: Option<(String, String)>,
    subject: Option<String>,
}

/// Per-assembly join point: collects the disjoint fields contributed by
/// the three branches, keyed by uid. Attachments are shared across uids.
/// Entries are emitted and removed as soon as they complete, so the map
/// never outlives the slowest branch for any item.
pub(crate) struct EnvelopeAccumulator {
    expected: usize,
    slots: HashMap<usize, Slot>,
    attachments: Option<Vec<ResolvedAttachment>>,
    complete: Vec<RenderedEnvelope>,
}

impl EnvelopeAccumulator {
    pub(crate) fn new(expected: usize) -> Self {
        Self {
            expected,
            slots: HashMap::new(),
            attachments: None,
            complete: Vec::with_capacity(expected),
        }
    }

    pub(crate) fn put_content(&mut self, uid: usize, html: String, text: String) {
        self.slots.entry(uid).or_default().content = Some((html, text));
        self.try_complete(uid);
    }

    pub(crate) fn put_subject(&mut self, uid: usize, subject: String) {
        self.slots.entry(uid).or_default().subject = Some(subject);
        self.try_complete(uid);
    }

    pub(crate) fn put_attachments(&mut self, attachments: Vec<ResolvedAttachment>) {
        self.attachments = Some(attachments);
        let uids: Vec<usize> = self.slots.keys().copied().collect();
        for uid in uids {
            self.try_complete(uid);
        }
    }

    fn try_complete(&mut self, uid: usize) {
        let Some(attachments) = &self.attachments else {
            return;
        };
        let ready = matches!(
            self.slots.get(&uid),
            Some(Slot {
                content: Some(_),
                subject: Some(_),
            })
        );
        if !ready {
            return;
        }
        if let Some(Slot {
            content: Some((html, text)),
            subject: Some(subject),
        }) = self.slots.remove(&uid)
        {
            self.complete.push(RenderedEnvelope {
                uid,
                subject,
                html,
                text,
                attachments: attachments.clone(),
            });
        }
    }

    pub(crate) fn finish(mut self) -> Result<Vec<RenderedEnvelope>> {
        if self.complete.len() != self.expected || !self.slots.is_empty() {
            return Err(CommError::Assembly(format!(
                "expected {} envelopes, completed {}",
                self.expected,
                self.complete.len()
            )));
        }
        self.complete.sort_by_key(|e| e.uid);
        Ok(self.complete)
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.slots.len()
    }
}
