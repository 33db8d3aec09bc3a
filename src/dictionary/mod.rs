//! Tag Dictionary
//!
//! A tree of categories, each owning an ordered list of bilingual tags
//! (English name ↔ Japanese description). The whole tree is one value owned
//! by the caller; every operation borrows it explicitly.

pub mod browse;
pub mod store;
pub mod tags;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use browse::{CategoryNode, DictionaryStats, TagRow};
pub use tags::{TagRef, TagUpsert, TranslationReport};

/// Separator between category names in a display path
pub const PATH_SEPARATOR: &str = " / ";

/// Description placeholder written by older dictionaries for untranslated tags
pub const PLACEHOLDER_DESCRIPTION: &str = "説明なし";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("Category name must not be empty")]
    EmptyName,
    #[error("Tag name must not be empty")]
    EmptyTagName,
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Category name '{name}' must not contain the path separator ' / '")]
    NameContainsSeparator { name: String },
    #[error("Category '{name}' already exists at this level")]
    DuplicateName { name: String },
    #[error("Category '{name}' has {count} child categories; delete them first")]
    HasChildren { name: String, count: usize },
    #[error("Category '{name}' still holds {count} tags; move or delete them first")]
    HasTags { name: String, count: usize },
    #[error("Cyclic parent chain detected at category {0}")]
    CyclicParentChain(String),
    #[error("Category {id} references missing parent {parent_id}")]
    DanglingParent { id: String, parent_id: String },
    #[error("Duplicate category id: {0}")]
    DuplicateId(String),
}

impl Serialize for DictionaryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A single tag: English identifier plus Japanese description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub en: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ja: String,
}

impl Tag {
    /// Build a tag; the description is stored trimmed
    pub fn new(en: impl Into<String>, ja: &str) -> Self {
        Self {
            en: en.into(),
            ja: ja.trim().to_string(),
        }
    }

    /// True when the description is empty or the legacy placeholder
    pub fn is_untranslated(&self) -> bool {
        self.ja.is_empty() || self.ja == PLACEHOLDER_DESCRIPTION
    }
}

/// A node of the category tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<Tag>,
}

impl Category {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// The full dictionary, persisted as one snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dictionary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<Category>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Trim every description in place (applied on load)
    pub fn normalize(&mut self) {
        for tag in self.categories.iter_mut().flat_map(|c| c.tags.iter_mut()) {
            let trimmed = tag.ja.trim();
            if trimmed.len() != tag.ja.len() {
                tag.ja = trimmed.to_string();
            }
        }
    }
}

/// Treat an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lowercase key used for every case-insensitive comparison
pub(crate) fn fold(s: &str) -> String {
    s.to_lowercase()
}
