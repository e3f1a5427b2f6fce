//! Locale catalogs for template rendering
//!
//! Catalogs live under `<templates_dir>/locales/<lang>.toml`. Nested TOML
//! tables are flattened into dotted keys, so
//!
//! ```toml
//! [invitation]
//! subject = "You are invited"
//! ```
//!
//! is looked up as `invitation.subject`. Templates call the registered
//! `t` function: `{{ t(key="invitation.subject") }}`.

use crate::error::{CommError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct I18n {
    default_lang: String,
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl I18n {
    /// Load every `<lang>.toml` catalog under `dir`.
    ///
    /// A missing locales directory yields an empty catalog set; lookups
    /// then fall back to the key itself.
    pub fn load(dir: &Path, default_lang: &str) -> Result<Self> {
        let mut catalogs = HashMap::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No locales directory at {}", dir.display());
                return Ok(Self {
                    default_lang: default_lang.to_string(),
                    catalogs,
                });
            }
            Err(e) => {
                return Err(CommError::Filesystem {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        };

        for entry in entries {
            let entry = entry.map_err(|e| CommError::Filesystem {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(&path).map_err(|e| CommError::Filesystem {
                path: path.clone(),
                source: e,
            })?;
            let table: toml::Table = content
                .parse()
                .map_err(|e: toml::de::Error| CommError::Config(e.to_string()))?;

            let mut flat = HashMap::new();
            flatten(&table, "", &mut flat);
            debug!("Loaded locale '{}' ({} keys)", lang, flat.len());
            catalogs.insert(lang.to_string(), flat);
        }

        Ok(Self {
            default_lang: default_lang.to_string(),
            catalogs,
        })
    }

    /// Look up `key` in `lang`, falling back to the default language,
    /// falling back to the key itself.
    pub fn translate(&self, lang: &str, key: &str) -> String {
        if let Some(value) = self.catalogs.get(lang).and_then(|c| c.get(key)) {
            return value.clone();
        }
        if let Some(value) = self
            .catalogs
            .get(&self.default_lang)
            .and_then(|c| c.get(key))
        {
            return value.clone();
        }
        warn!("Missing translation for '{}' (lang: {})", key, lang);
        key.to_string()
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    /// Register the `t` translation function on a tera instance, bound
    /// to the given language.
    pub fn register(self: &Arc<Self>, tera: &mut tera::Tera, lang: &str) {
        let i18n = Arc::clone(self);
        let lang = lang.to_string();
        tera.register_function(
            "t",
            move |args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
                let key = args
                    .get("key")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| tera::Error::msg("t() requires a string `key` argument"))?;
                Ok(tera::Value::String(i18n.translate(&lang, key)))
            },
        );
    }
}

fn flatten(table: &toml::Table, prefix: &str, out: &mut HashMap<String, String>) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(inner) => flatten(inner, &full_key, out),
            toml::Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            other => {
                out.insert(full_key, other.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_locales(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("en.toml"),
            "greeting = \"Hello\"\n[invitation]\nsubject = \"You are invited\"\n",
        )
        .unwrap();
        fs::write(dir.join("fr.toml"), "greeting = \"Bonjour\"\n").unwrap();
    }

    #[test]
    fn test_lookup_and_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("locales");
        write_locales(&dir);

        let i18n = I18n::load(&dir, "en").unwrap();
        assert_eq!(i18n.translate("fr", "greeting"), "Bonjour");
        // fr has no invitation.subject, falls back to en
        assert_eq!(i18n.translate("fr", "invitation.subject"), "You are invited");
        // nobody has this key, falls back to the key itself
        assert_eq!(i18n.translate("fr", "nope"), "nope");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let i18n = I18n::load(&tmp.path().join("locales"), "en").unwrap();
        assert_eq!(i18n.translate("en", "anything"), "anything");
    }

    #[test]
    fn test_tera_function() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("locales");
        write_locales(&dir);

        let i18n = Arc::new(I18n::load(&dir, "en").unwrap());
        let mut tera = tera::Tera::default();
        i18n.register(&mut tera, "fr");
        tera.add_raw_template("s", "{{ t(key=\"greeting\") }}").unwrap();

        let rendered = tera.render("s", &tera::Context::new()).unwrap();
        assert_eq!(rendered, "Bonjour");
    }
}
