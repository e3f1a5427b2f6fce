//! Static attachment discovery and merging
//!
//! Each template type may ship static attachments under
//! `<attachments_dir>/<type>/`. Discovered files are merged with
//! caller-supplied references; hidden files (leading dot) are excluded
//! from both sources.

use crate::error::{CommError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Caller-supplied attachment reference. `path` and `cid` are optional;
/// resolution fills them with defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AttachmentRef {
    pub filename: String,
    pub path: Option<PathBuf>,
    pub cid: Option<String>,
}

impl AttachmentRef {
    pub fn new<S: Into<String>>(filename: S) -> Self {
        Self {
            filename: filename.into(),
            path: None,
            cid: None,
        }
    }
}

/// Fully resolved attachment descriptor. `cid` doubles as the Content-ID
/// for inline HTML references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    pub filename: String,
    pub path: PathBuf,
    pub cid: String,
}

pub struct AttachmentResolver {
    root: PathBuf,
}

impl AttachmentResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Discover attachments for `template_type` and merge with `extra`.
    ///
    /// A missing type directory counts as "no attachments"; other I/O
    /// failures surface as filesystem errors. A caller-supplied entry
    /// with the same filename overrides the discovered one.
    pub async fn resolve(
        &self,
        template_type: &str,
        extra: &[AttachmentRef],
    ) -> Result<Vec<ResolvedAttachment>> {
        let dir = self.root.join(template_type);
        let mut resolved: Vec<ResolvedAttachment> = Vec::new();

        match tokio::fs::read_dir(&dir).await {
            Ok(mut entries) => {
                let mut names = Vec::new();
                while let Some(entry) = entries.next_entry().await.map_err(|e| {
                    CommError::Filesystem {
                        path: dir.clone(),
                        source: e,
                    }
                })? {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                names.sort();
                debug!(
                    "Discovered {} attachment(s) for '{}'",
                    names.len(),
                    template_type
                );
                for name in names {
                    if is_hidden(&name) {
                        continue;
                    }
                    resolved.push(ResolvedAttachment {
                        path: dir.join(&name),
                        cid: name.clone(),
                        filename: name,
                    });
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No attachment directory for '{}'", template_type);
            }
            Err(e) => {
                return Err(CommError::Filesystem {
                    path: dir,
                    source: e,
                })
            }
        }

        for reference in extra {
            if is_hidden(&reference.filename) {
                continue;
            }
            let entry = ResolvedAttachment {
                filename: reference.filename.clone(),
                path: reference
                    .path
                    .clone()
                    .unwrap_or_else(|| dir.join(&reference.filename)),
                cid: reference
                    .cid
                    .clone()
                    .unwrap_or_else(|| reference.filename.clone()),
            };
            match resolved.iter_mut().find(|a| a.filename == entry.filename) {
                Some(existing) => *existing = entry,
                None => resolved.push(entry),
            }
        }

        Ok(resolved)
    }
}

fn is_hidden(filename: &str) -> bool {
    filename.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_discovers_and_filters_hidden() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("invitation");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("logo.png"), b"png").unwrap();
        fs::write(dir.join(".DS_Store"), b"junk").unwrap();

        let resolver = AttachmentResolver::new(tmp.path());
        let resolved = resolver.resolve("invitation", &[]).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].filename, "logo.png");
        assert_eq!(resolved[0].cid, "logo.png");
        assert_eq!(resolved[0].path, dir.join("logo.png"));
    }

    #[tokio::test]
    async fn test_hidden_caller_refs_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = AttachmentResolver::new(tmp.path());

        let extra = vec![
            AttachmentRef::new(".hidden.pdf"),
            AttachmentRef::new("report.pdf"),
        ];
        let resolved = resolver.resolve("missing-type", &extra).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].filename, "report.pdf");
    }

    #[tokio::test]
    async fn test_missing_directory_is_no_attachments() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = AttachmentResolver::new(tmp.path().join("nowhere"));
        let resolved = resolver.resolve("invitation", &[]).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_caller_ref_overrides_discovered() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("invitation");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("logo.png"), b"png").unwrap();

        let extra = vec![AttachmentRef {
            filename: "logo.png".to_string(),
            path: Some(PathBuf::from("/elsewhere/logo.png")),
            cid: Some("inline-logo".to_string()),
        }];

        let resolver = AttachmentResolver::new(tmp.path());
        let resolved = resolver.resolve("invitation", &extra).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path, PathBuf::from("/elsewhere/logo.png"));
        assert_eq!(resolved[0].cid, "inline-logo");
    }
}
