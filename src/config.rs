//! Preferences
//!
//! User preferences stored as camelCase JSON under the app data directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::merge::MergeOptions;
use crate::snapshot::{self, SnapshotError};
use crate::tagset::DEFAULT_DELIMITER;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl Serialize for ConfigError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// Separator used when rendering a tag set
    pub delimiter: String,
    /// Dictionary snapshot; the app data default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_file: Option<PathBuf>,
    /// Foreign parent id treated as a local top-level category name on merge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_parent_alias: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            dictionary_file: None,
            merge_parent_alias: None,
        }
    }
}

impl Preferences {
    /// Read preferences; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = ?path, "No preferences file; using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        snapshot::atomic_write(path, &content)?;
        Ok(())
    }

    /// `override_path` (the `--dict` flag) wins over the configured file
    pub fn dictionary_path(&self, override_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = override_path {
            return Ok(path.to_path_buf());
        }
        match &self.dictionary_file {
            Some(path) => Ok(path.clone()),
            None => Ok(snapshot::default_dictionary_path()?),
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            parent_alias: self
                .merge_parent_alias
                .as_deref()
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .map(str::to_string),
        }
    }
}

pub fn preferences_path() -> Result<PathBuf, ConfigError> {
    Ok(snapshot::get_app_data_dir()?.join("config/preferences.json"))
}

/// Create the app data layout and default preferences if absent.
/// Returns the app data directory.
pub fn init_app_data_dir() -> Result<PathBuf, ConfigError> {
    let base = snapshot::get_app_data_dir()?;
    init_app_data_dir_at(&base)?;
    Ok(base)
}

fn init_app_data_dir_at(base: &Path) -> Result<(), ConfigError> {
    let config_dir = base.join("config");
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    let prefs_path = config_dir.join("preferences.json");
    if !prefs_path.exists() {
        Preferences::default().save(&prefs_path)?;
        info!(path = ?prefs_path, "Default preferences written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let prefs = Preferences::load(&dir.path().join("preferences.json")).unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.delimiter, ", ");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, r#"{"mergeParentAlias": "general"}"#).unwrap();

        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.delimiter, DEFAULT_DELIMITER);
        assert_eq!(prefs.merge_options().parent_alias.as_deref(), Some("general"));
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "delimiter = ';'").unwrap();
        assert!(matches!(Preferences::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_dictionary_path_precedence() {
        let prefs = Preferences {
            dictionary_file: Some(PathBuf::from("/data/tags.json")),
            ..Preferences::default()
        };
        let flag = PathBuf::from("/tmp/other.json");
        assert_eq!(prefs.dictionary_path(Some(flag.as_path())).unwrap(), flag);
        assert_eq!(prefs.dictionary_path(None).unwrap(), PathBuf::from("/data/tags.json"));
    }

    #[test]
    fn test_blank_alias_is_off() {
        let prefs = Preferences {
            merge_parent_alias: Some("  ".to_string()),
            ..Preferences::default()
        };
        assert_eq!(prefs.merge_options().parent_alias, None);
    }

    #[test]
    fn test_init_writes_defaults_once() {
        let dir = tempdir().unwrap();
        init_app_data_dir_at(dir.path()).unwrap();

        let path = dir.path().join("config/preferences.json");
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"delimiter\""));

        // Existing preferences are left alone
        fs::write(&path, r#"{"delimiter": " "}"#).unwrap();
        init_app_data_dir_at(dir.path()).unwrap();
        assert_eq!(Preferences::load(&path).unwrap().delimiter, " ");
    }
}
