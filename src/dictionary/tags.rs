//! Tag operations
//!
//! Tags are unique by English name across the whole tree, compared
//! case-insensitively.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{fold, Dictionary, DictionaryError, Tag};

/// Outcome of [`Dictionary::add_or_update`]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TagUpsert {
    /// Appended to the requested category
    #[serde(rename_all = "camelCase")]
    Created { category_id: String },
    /// An existing tag had its description overwritten in place.
    ///
    /// `category_id` is the category that holds the tag. The tag is never
    /// moved; `category_differs` tells the caller that a different category
    /// was requested.
    #[serde(rename_all = "camelCase")]
    Updated {
        category_id: String,
        changed: bool,
        category_differs: bool,
    },
}

/// Borrowed view of a tag and its owning category
#[derive(Debug, Clone, Copy)]
pub struct TagRef<'a> {
    pub tag: &'a Tag,
    pub category_id: &'a str,
}

/// Result of applying a batch of translated descriptions
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationReport {
    pub updated: usize,
    pub unchanged: usize,
    pub not_found: Vec<String>,
}

impl Dictionary {
    /// Add a tag to `category_id`, or overwrite the description of the tag
    /// with the same English name wherever it lives.
    pub fn add_or_update(
        &mut self,
        category_id: &str,
        en: &str,
        ja: &str,
    ) -> Result<TagUpsert, DictionaryError> {
        let en = en.trim();
        if en.is_empty() {
            return Err(DictionaryError::EmptyTagName);
        }
        if self.find_by_id(category_id).is_none() {
            return Err(DictionaryError::CategoryNotFound(category_id.to_string()));
        }

        let en_lower = fold(en);
        let ja = ja.trim();

        for category in &mut self.categories {
            if let Some(tag) = category.tags.iter_mut().find(|t| fold(&t.en) == en_lower) {
                let changed = tag.ja != ja;
                if changed {
                    tag.ja = ja.to_string();
                }
                let category_differs = category.id != category_id;
                if category_differs {
                    warn!(
                        tag = %tag.en,
                        held_by = %category.id,
                        requested = %category_id,
                        "Tag already belongs to another category; description updated in place"
                    );
                }
                return Ok(TagUpsert::Updated {
                    category_id: category.id.clone(),
                    changed,
                    category_differs,
                });
            }
        }

        let category = self
            .find_by_id_mut(category_id)
            .ok_or_else(|| DictionaryError::CategoryNotFound(category_id.to_string()))?;
        category.tags.push(Tag::new(en, ja));

        debug!(tag = %en, category = %category_id, "Tag created");
        Ok(TagUpsert::Created {
            category_id: category_id.to_string(),
        })
    }

    /// Remove every tag whose English name is in `en_set` (case-insensitive).
    /// Returns the number removed.
    pub fn delete_by_en_set<I, S>(&mut self, en_set: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: HashSet<String> = en_set.into_iter().map(|en| fold(en.as_ref())).collect();
        if targets.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for category in &mut self.categories {
            let before = category.tags.len();
            category.tags.retain(|t| !targets.contains(&fold(&t.en)));
            removed += before - category.tags.len();
        }

        info!(requested = targets.len(), removed, "Tags deleted");
        removed
    }

    /// Lowercase English name -> tag, built fresh from the current tree
    pub fn all_flat_by_en_lower(&self) -> HashMap<String, TagRef<'_>> {
        let mut flat = HashMap::new();
        for category in &self.categories {
            for tag in &category.tags {
                flat.insert(
                    fold(&tag.en),
                    TagRef {
                        tag,
                        category_id: &category.id,
                    },
                );
            }
        }
        flat
    }

    pub fn find_tag(&self, en: &str) -> Option<TagRef<'_>> {
        let en_lower = fold(en.trim());
        self.categories.iter().find_map(|category| {
            category
                .tags
                .iter()
                .find(|t| fold(&t.en) == en_lower)
                .map(|tag| TagRef {
                    tag,
                    category_id: &category.id,
                })
        })
    }

    pub fn contains_tag(&self, en: &str) -> bool {
        self.find_tag(en).is_some()
    }

    pub fn tag_count(&self) -> usize {
        self.categories.iter().map(|c| c.tags.len()).sum()
    }

    /// Every `(en, ja)` pair in store order, for flat export
    pub fn all_pairs(&self) -> Vec<(&str, &str)> {
        self.categories
            .iter()
            .flat_map(|c| c.tags.iter())
            .map(|t| (t.en.as_str(), t.ja.as_str()))
            .collect()
    }

    /// Tags that still need a description
    pub fn untranslated(&self) -> Vec<&Tag> {
        self.categories
            .iter()
            .flat_map(|c| c.tags.iter())
            .filter(|t| t.is_untranslated())
            .collect()
    }

    /// Overwrite descriptions of existing tags from translated `(en, ja)` pairs.
    /// Unknown English names are collected, never created.
    pub fn import_translations<I>(&mut self, pairs: I) -> TranslationReport
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut positions: HashMap<String, (usize, usize)> = HashMap::new();
        for (ci, category) in self.categories.iter().enumerate() {
            for (ti, tag) in category.tags.iter().enumerate() {
                positions.insert(fold(&tag.en), (ci, ti));
            }
        }

        let mut report = TranslationReport::default();
        for (en, ja) in pairs {
            let en = en.trim();
            let ja = ja.trim();
            match positions.get(&fold(en)) {
                Some(&(ci, ti)) => {
                    let tag = &mut self.categories[ci].tags[ti];
                    if tag.ja != ja {
                        tag.ja = ja.to_string();
                        report.updated += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
                None => {
                    debug!(tag = %en, "Translated tag not in dictionary");
                    report.not_found.push(en.to_string());
                }
            }
        }

        info!(
            updated = report.updated,
            not_found = report.not_found.len(),
            "Translations imported"
        );
        report
    }
}
