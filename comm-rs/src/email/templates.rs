//! Tera adapter for the on-disk template layout
//!
//! Template bundles are selected by type name:
//! - `<templates_dir>/content/<type>/html.tera` (required)
//! - `<templates_dir>/content/<type>/text.tera` (optional)
//! - `<templates_dir>/subject/<type>/subject.tera`
//!
//! A batch render loads and compiles the bundle once and renders it once
//! per data item; templates are never reloaded per item.

use crate::error::{CommError, Result};
use crate::i18n::I18n;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::DataItem;

/// Rendered content bodies for one data item.
#[derive(Debug, Clone)]
pub struct RenderedContent {
    pub uid: usize,
    pub html: String,
    pub text: String,
}

pub struct TemplateRenderer {
    templates_dir: PathBuf,
    i18n: Arc<I18n>,
}

impl TemplateRenderer {
    pub fn new<P: Into<PathBuf>>(templates_dir: P, i18n: Arc<I18n>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            i18n,
        }
    }

    /// Render the content bundle for `template_type` against every item.
    pub async fn render_content(
        &self,
        template_type: &str,
        lang: &str,
        data: &[DataItem],
    ) -> Result<Vec<RenderedContent>> {
        let dir = self.templates_dir.join("content").join(template_type);
        let html_src = read_template(&dir.join("html.tera")).await?;
        let text_src = read_optional_template(&dir.join("text.tera")).await?;

        let mut tera = self.engine(lang);
        tera.add_raw_template("html", &html_src)?;
        if let Some(text_src) = &text_src {
            tera.add_raw_template("text", text_src)?;
        }
        debug!(
            "Compiled content templates for '{}' ({} items)",
            template_type,
            data.len()
        );

        let mut rendered = Vec::with_capacity(data.len());
        for (uid, item) in data.iter().enumerate() {
            let context = tera::Context::from_serialize(item)?;
            let html = tera.render("html", &context)?;
            let text = match &text_src {
                Some(_) => tera.render("text", &context)?,
                None => String::new(),
            };
            rendered.push(RenderedContent { uid, html, text });
        }
        Ok(rendered)
    }

    /// Render the subject template for `template_type` against every item.
    pub async fn render_subjects(
        &self,
        template_type: &str,
        lang: &str,
        data: &[DataItem],
    ) -> Result<Vec<(usize, String)>> {
        let path = self
            .templates_dir
            .join("subject")
            .join(template_type)
            .join("subject.tera");
        let subject_src = read_template(&path).await?;

        let mut tera = self.engine(lang);
        tera.add_raw_template("subject", &subject_src)?;

        let mut rendered = Vec::with_capacity(data.len());
        for (uid, item) in data.iter().enumerate() {
            let context = tera::Context::from_serialize(item)?;
            let subject = tera.render("subject", &context)?;
            rendered.push((uid, subject.trim().to_string()));
        }
        Ok(rendered)
    }

    /// Fresh engine with the `t` translation helper bound to `lang`.
    fn engine(&self, lang: &str) -> tera::Tera {
        let mut tera = tera::Tera::default();
        self.i18n.register(&mut tera, lang);
        tera
    }
}

async fn read_template(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CommError::Filesystem {
            path: path.to_path_buf(),
            source: e,
        })
}

async fn read_optional_template(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(src) => Ok(Some(src)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CommError::Filesystem {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn fixture(tmp: &Path) -> TemplateRenderer {
        let content = tmp.join("content").join("testing");
        fs::create_dir_all(&content).unwrap();
        fs::write(content.join("html.tera"), "<p>Hi {{ user.name }}</p>").unwrap();
        fs::write(content.join("text.tera"), "Hi {{ user.name }}").unwrap();

        let subject = tmp.join("subject").join("testing");
        fs::create_dir_all(&subject).unwrap();
        fs::write(subject.join("subject.tera"), "Welcome {{ user.name }}\n").unwrap();

        TemplateRenderer::new(tmp, Arc::new(I18n::default()))
    }

    #[tokio::test]
    async fn test_batch_content_render() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = fixture(tmp.path());

        let data = vec![
            json!({"user": {"name": "Alice"}}),
            json!({"user": {"name": "Bob"}}),
        ];
        let rendered = renderer
            .render_content("testing", "en", &data)
            .await
            .unwrap();

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].uid, 0);
        assert_eq!(rendered[0].html, "<p>Hi Alice</p>");
        assert_eq!(rendered[1].text, "Hi Bob");
    }

    #[tokio::test]
    async fn test_subject_render_trims() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = fixture(tmp.path());

        let data = vec![json!({"user": {"name": "Alice"}})];
        let subjects = renderer
            .render_subjects("testing", "en", &data)
            .await
            .unwrap();
        assert_eq!(subjects, vec![(0, "Welcome Alice".to_string())]);
    }

    #[tokio::test]
    async fn test_missing_template_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = fixture(tmp.path());

        let data = vec![json!({})];
        let err = renderer
            .render_content("unknown-type", "en", &data)
            .await
            .unwrap_err();
        assert!(matches!(err, CommError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn test_missing_text_template_yields_empty_text() {
        let tmp = tempfile::tempdir().unwrap();
        let content = tmp.path().join("content").join("htmlonly");
        fs::create_dir_all(&content).unwrap();
        fs::write(content.join("html.tera"), "<b>x</b>").unwrap();

        let renderer = TemplateRenderer::new(tmp.path(), Arc::new(I18n::default()));
        let rendered = renderer
            .render_content("htmlonly", "en", &[json!({})])
            .await
            .unwrap();
        assert_eq!(rendered[0].html, "<b>x</b>");
        assert_eq!(rendered[0].text, "");
    }
}
