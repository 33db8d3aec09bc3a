//! Snapshot Persistence
//!
//! The dictionary lives in a single pretty-printed JSON file. Saves are
//! atomic; loads trim descriptions and check the tree structure.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dictionary::{Dictionary, DictionaryError, DictionaryStats};

/// Application identifier, used as the data directory name
pub const APP_IDENTIFIER: &str = "com.tagdict.dev";

/// File name of the default dictionary snapshot
pub const DICTIONARY_FILE_NAME: &str = "tag_dictionary.json";

const SEED_DICTIONARY: &str = include_str!("../assets/seed_dictionary.json");

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Dictionary integrity error: {0}")]
    Integrity(#[from] DictionaryError),
    #[error("App data directory not found")]
    NoAppDataDir,
}

impl Serialize for SnapshotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// File metadata plus summary counts, for `info`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    pub bytes: u64,
    pub stats: DictionaryStats,
}

/// `<data_dir>/com.tagdict.dev`
pub fn get_app_data_dir() -> Result<PathBuf, SnapshotError> {
    let base = dirs::data_dir().ok_or(SnapshotError::NoAppDataDir)?;
    Ok(base.join(APP_IDENTIFIER))
}

pub fn default_dictionary_path() -> Result<PathBuf, SnapshotError> {
    Ok(get_app_data_dir()?.join(DICTIONARY_FILE_NAME))
}

/// Write to a `.tmp` sibling then rename into place, so a crash mid-write
/// leaves the previous file intact.
pub(crate) fn atomic_write(path: &Path, contents: &str) -> Result<(), SnapshotError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!(path = ?tmp, error = %cleanup, "Failed to remove temporary file");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Parse a snapshot and trim its descriptions, without structural checks.
/// Used for import files, whose problems the merge reports itself.
pub fn load_unvalidated(path: &Path) -> Result<Dictionary, SnapshotError> {
    let content = fs::read_to_string(path)?;
    let mut dictionary: Dictionary = serde_json::from_str(&content)?;
    dictionary.normalize();
    Ok(dictionary)
}

/// Parse and validate a dictionary file that must exist, e.g. one that is
/// about to replace the current snapshot.
pub fn import_dictionary(path: &Path) -> Result<Dictionary, SnapshotError> {
    let dictionary = load_unvalidated(path)?;
    dictionary.validate()?;
    Ok(dictionary)
}

/// Load and validate the dictionary. A missing file is an empty dictionary.
pub fn load_snapshot(path: &Path) -> Result<Dictionary, SnapshotError> {
    if !path.exists() {
        debug!(path = ?path, "No dictionary file yet; starting empty");
        return Ok(Dictionary::new());
    }

    let dictionary = import_dictionary(path)?;

    debug!(
        path = ?path,
        categories = dictionary.categories.len(),
        tags = dictionary.tag_count(),
        "Dictionary loaded"
    );
    Ok(dictionary)
}

/// Like [`load_snapshot`], but a broken file yields an empty dictionary
/// together with the error so the caller can report it.
pub fn load_or_empty(path: &Path) -> (Dictionary, Option<SnapshotError>) {
    match load_snapshot(path) {
        Ok(dictionary) => (dictionary, None),
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to load dictionary; starting empty");
            (Dictionary::new(), Some(e))
        }
    }
}

pub fn save_snapshot(path: &Path, dictionary: &Dictionary) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(dictionary)?;
    atomic_write(path, &content)?;

    info!(
        path = ?path,
        categories = dictionary.categories.len(),
        tags = dictionary.tag_count(),
        "Dictionary saved"
    );
    Ok(())
}

pub fn snapshot_info(path: &Path, dictionary: &Dictionary) -> SnapshotInfo {
    let metadata = fs::metadata(path).ok();
    SnapshotInfo {
        path: path.display().to_string(),
        exists: metadata.is_some(),
        modified: metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from),
        bytes: metadata.map(|m| m.len()).unwrap_or(0),
        stats: dictionary.stats(),
    }
}

/// Built-in demo dictionary
pub fn seed_dictionary() -> Result<Dictionary, SnapshotError> {
    let mut dictionary: Dictionary = serde_json::from_str(SEED_DICTIONARY)?;
    dictionary.normalize();
    dictionary.validate()?;
    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::fixture;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.json");
        let dict = fixture();

        save_snapshot(&path, &dict).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), dict);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_saved_file_keeps_japanese_literal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.json");
        save_snapshot(&path, &fixture()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("シャツが開いている"));
        assert!(raw.contains("\"parent_id\": null"));
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/dict.json");
        save_snapshot(&path, &fixture()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_failed_rename_removes_temporary_file() {
        let dir = tempdir().unwrap();
        // A directory in the way makes the rename fail
        let path = dir.path().join("dict.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(matches!(
            save_snapshot(&path, &fixture()),
            Err(SnapshotError::Io(_))
        ));
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_import_dictionary_requires_a_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("incoming.json");

        // Unlike load_snapshot, a missing file is an error
        assert!(matches!(import_dictionary(&path), Err(SnapshotError::Io(_))));

        fs::write(
            &path,
            r#"{"categories": [{"id": "a", "name": "A", "parent_id": "a", "tags": []}]}"#,
        )
        .unwrap();
        assert!(matches!(
            import_dictionary(&path),
            Err(SnapshotError::Integrity(DictionaryError::CyclicParentChain(_)))
        ));

        save_snapshot(&path, &fixture()).unwrap();
        assert_eq!(import_dictionary(&path).unwrap(), fixture());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let dict = load_snapshot(&dir.path().join("absent.json")).unwrap();
        assert!(dict.is_empty());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.json");
        fs::write(&path, "{ not json").unwrap();

        let (dict, error) = load_or_empty(&path);
        assert!(dict.is_empty());
        assert!(matches!(error, Some(SnapshotError::Json(_))));
    }

    #[test]
    fn test_load_rejects_dangling_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.json");
        fs::write(
            &path,
            r#"{"categories": [{"id": "a", "name": "A", "parent_id": "ghost", "tags": []}]}"#,
        )
        .unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(SnapshotError::Integrity(DictionaryError::DanglingParent { .. }))
        ));
        // Import files skip the structural check
        assert_eq!(load_unvalidated(&path).unwrap().categories.len(), 1);
    }

    #[test]
    fn test_load_trims_descriptions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.json");
        fs::write(
            &path,
            r#"{"categories": [
                {"id": "a", "name": "A", "tags": [{"en": "x", "ja": " 説明 \n"}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(load_snapshot(&path).unwrap().categories[0].tags[0].ja, "説明");
    }

    #[test]
    fn test_snapshot_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.json");
        let dict = fixture();

        let missing = snapshot_info(&path, &Dictionary::new());
        assert!(!missing.exists);
        assert!(missing.modified.is_none());

        save_snapshot(&path, &dict).unwrap();
        let info = snapshot_info(&path, &dict);
        assert!(info.exists);
        assert!(info.bytes > 0);
        assert_eq!(info.stats.tags, 8);
    }

    #[test]
    fn test_seed_dictionary_is_valid() {
        let seed = seed_dictionary().unwrap();
        assert_eq!(seed.categories.len(), 6);
        assert_eq!(seed.path("01HZSEED0000000000CLOSTATE").unwrap(), "服装 / 状態・動作");
        assert_eq!(seed.untranslated().len(), 1);
    }
}
