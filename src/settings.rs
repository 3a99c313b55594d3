//! Persisted user settings: backend mode and optional API key
//!
//! Loaded once at startup, written only on explicit save. Malformed or
//! missing files fall back to defaults rather than failing.

use crate::backends::ProcessMode;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Process-wide configuration surviving across sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Selected backend mode
    #[serde(rename = "processMode")]
    pub mode: ProcessMode,
    /// Credential for the remote provider; only meaningful in `api` mode
    #[serde(rename = "removeBgApiKey", skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: ProcessMode::Api,
            api_key: None,
        }
    }
}

impl Settings {
    /// Default settings file location (`<config dir>/bgbatch/settings.json`)
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bgbatch").join("settings.json"))
    }

    /// Read settings from `path`.
    ///
    /// A missing, unreadable, or malformed file yields defaults, never an
    /// error. Malformed content is logged and left in place.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no settings file, using defaults");
                return Self::default();
            },
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed settings file, using defaults");
                Self::default()
            },
        }
    }

    /// Persist settings to `path`.
    ///
    /// Writes a sibling temp file and renames it over the target, so a
    /// concurrent reader never observes a partially written value.
    ///
    /// # Errors
    /// Returns `Io` when the directory cannot be created or the file cannot
    /// be written or renamed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.mode, ProcessMode::Api);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_load_malformed_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json at all").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());

        fs::write(&path, r#"{"processMode": "cloud"}"#).unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            mode: ProcessMode::Local,
            api_key: Some("key-123".to_string()),
        };
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_persisted_keys_match_contract() {
        let settings = Settings {
            mode: ProcessMode::Api,
            api_key: Some("k".to_string()),
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"processMode\":\"api\""));
        assert!(json.contains("\"removeBgApiKey\":\"k\""));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::default().save(&path).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("settings.json")]);
    }

    #[test]
    fn test_missing_api_key_field_deserializes() {
        let settings: Settings = serde_json::from_str(r#"{"processMode": "local"}"#).unwrap();
        assert_eq!(settings.mode, ProcessMode::Local);
        assert!(settings.api_key.is_none());
    }
}
