//! Classification workflow
//!
//! New tags are collected into a worklist, pre-filled from the top hint,
//! assigned to categories in bulk and then committed to the dictionary.
//! Rows that cannot be committed stay behind for another round.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dictionary::{fold, Dictionary, TagUpsert, PLACEHOLDER_DESCRIPTION};
use crate::hints::hint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingTag {
    pub en: String,
    pub ja: String,
    /// Display path of the target category; unassigned when `None`
    pub category_path: Option<String>,
}

impl PendingTag {
    /// A row pre-filled from the best hint for `en`
    pub fn suggested(dictionary: &Dictionary, en: &str) -> Self {
        let top = hint(dictionary, en).into_iter().next();
        let ja = top
            .as_ref()
            .and_then(|h| h.matched_tag())
            .map(|t| t.ja.trim())
            .filter(|ja| *ja != PLACEHOLDER_DESCRIPTION)
            .unwrap_or_default()
            .to_string();

        Self {
            en: en.to_string(),
            ja,
            category_path: top.map(|h| h.category_path().to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Rows whose category path did not resolve
    pub invalid_paths: Vec<String>,
    /// Rows left in the worklist
    pub remaining: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Worklist {
    pub rows: Vec<PendingTag>,
    /// Input tags skipped because the dictionary already has them
    pub known: Vec<String>,
}

impl Worklist {
    /// Build a worklist from raw input tags. Tags already in the dictionary
    /// are reported in `known`; repeats within the input are dropped.
    pub fn from_raw<I, S>(dictionary: &Dictionary, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let existing = dictionary.all_flat_by_en_lower();
        let mut seen = HashSet::new();
        let mut worklist = Self::default();

        for tag in tags {
            let en = tag.as_ref().trim();
            if en.is_empty() {
                continue;
            }
            let en_lower = fold(en);
            if !seen.insert(en_lower.clone()) {
                continue;
            }
            if existing.contains_key(&en_lower) {
                worklist.known.push(en.to_string());
                continue;
            }
            worklist.rows.push(PendingTag::suggested(dictionary, en));
        }

        info!(
            pending = worklist.rows.len(),
            known = worklist.known.len(),
            "Classification worklist built"
        );
        worklist
    }

    /// Rows supplied as-is, e.g. a bulk edit of existing tags
    pub fn from_rows(rows: Vec<PendingTag>) -> Self {
        Self {
            rows,
            known: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Set the category path of the rows at `indices`. An empty path
    /// unassigns them. Returns how many rows were touched.
    pub fn assign_category(&mut self, indices: &[usize], path: &str) -> usize {
        let path = path.trim();
        let mut assigned = 0;
        for &index in indices {
            if let Some(row) = self.rows.get_mut(index) {
                row.category_path = (!path.is_empty()).then(|| path.to_string());
                assigned += 1;
            }
        }
        assigned
    }

    /// Assign every row
    pub fn assign_all(&mut self, path: &str) -> usize {
        let indices: Vec<usize> = (0..self.rows.len()).collect();
        self.assign_category(&indices, path)
    }

    /// Write every assigned row to the dictionary. Unassigned rows and rows
    /// with an unknown path stay in the worklist with fresh suggestions.
    pub fn commit(&mut self, dictionary: &mut Dictionary) -> CommitReport {
        let mut report = CommitReport::default();
        let mut leftover = Vec::new();

        for row in std::mem::take(&mut self.rows) {
            let Some(path) = row.category_path.as_deref() else {
                leftover.push(row.en);
                continue;
            };
            let Some(category_id) = dictionary.resolve_path(path) else {
                warn!(tag = %row.en, path = %path, "Unknown category path; tag left unclassified");
                report.invalid_paths.push(row.en.clone());
                leftover.push(row.en);
                continue;
            };

            match dictionary.add_or_update(&category_id, &row.en, &row.ja) {
                Ok(TagUpsert::Created { .. }) => report.added += 1,
                Ok(TagUpsert::Updated { changed: true, .. }) => report.updated += 1,
                Ok(TagUpsert::Updated { changed: false, .. }) => report.unchanged += 1,
                Err(e) => {
                    warn!(tag = %row.en, error = %e, "Failed to add tag");
                    leftover.push(row.en);
                }
            }
        }

        self.rows = leftover
            .iter()
            .map(|en| PendingTag::suggested(dictionary, en))
            .collect();
        report.remaining = self.rows.len();

        info!(
            added = report.added,
            updated = report.updated,
            remaining = report.remaining,
            "Classified tags committed"
        );
        report
    }
}
