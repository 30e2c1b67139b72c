//! Persisted user preferences
//!
//! Loaded once at startup; [`Preferences::set_ui_language`] is the only way
//! to change them and it writes through to disk.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::locale::UiLanguage;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default)]
    ui_language: UiLanguage,
}

#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
    stored: StoredPreferences,
}

impl Preferences {
    /// Read the persisted preferences. A missing or unreadable file yields
    /// the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stored = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Ignoring unreadable preferences {}: {}", path.display(), e);
                    StoredPreferences::default()
                }
            },
            Err(_) => {
                debug!("No preferences at {}, using defaults", path.display());
                StoredPreferences::default()
            }
        };

        Self { path, stored }
    }

    pub fn ui_language(&self) -> UiLanguage {
        self.stored.ui_language
    }

    /// Update the interface language and persist it
    pub fn set_ui_language(&mut self, language: UiLanguage) -> Result<()> {
        self.stored.ui_language = language;
        self.persist()?;
        info!("💾 Interface language set to {}", language);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, toml::to_string_pretty(&self.stored)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_default() {
        let dir = TempDir::new().unwrap();
        let prefs = Preferences::load(dir.path().join("prefs.toml"));
        assert_eq!(prefs.ui_language(), UiLanguage::Ru);
    }

    #[test]
    fn test_setter_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("prefs.toml");

        let mut prefs = Preferences::load(&path);
        prefs.set_ui_language(UiLanguage::En).unwrap();
        assert_eq!(prefs.ui_language(), UiLanguage::En);

        let reloaded = Preferences::load(&path);
        assert_eq!(reloaded.ui_language(), UiLanguage::En);
    }

    #[test]
    fn test_garbage_file_uses_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "ui_language = 42").unwrap();
        assert_eq!(Preferences::load(&path).ui_language(), UiLanguage::Ru);
    }
}
