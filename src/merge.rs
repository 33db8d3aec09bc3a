//! Merge/Import Resolver
//!
//! Folds a foreign dictionary into the local one. Foreign categories are
//! matched by `(name, resolved parent)` and foreign ids are never trusted:
//! every new category gets a fresh local id. Tags merge by English name.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::dictionary::store::check_category_name;
use crate::dictionary::{fold, Category, Dictionary, DictionaryError, Tag};

/// Knobs for [`merge`]
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Foreign parent id that stands for "the local top-level category with
    /// this name" (older exports used `"general"`). Off when `None`.
    pub parent_alias: Option<String>,
}

/// Non-fatal problems found while merging
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeWarning {
    /// Parent was neither local nor in the batch; category added at the top level
    #[serde(rename_all = "camelCase")]
    OrphanPromoted { name: String, parent_id: String },
    /// A pass made no progress; the remaining categories were not merged
    #[serde(rename_all = "camelCase")]
    UnresolvedDependency { remaining: usize },
    /// Later category with an id already seen in the batch; skipped
    #[serde(rename_all = "camelCase")]
    DuplicateForeignId { id: String, name: String },
    /// Name fails the local naming rules; category and its tags skipped
    #[serde(rename_all = "camelCase")]
    InvalidName { name: String, error: DictionaryError },
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub categories_added: usize,
    pub tags_added: usize,
    pub tags_updated: usize,
    pub warnings: Vec<MergeWarning>,
    /// Names of foreign categories left out (invalid names, cyclic or
    /// unresolvable parents)
    pub unresolved: Vec<String>,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.categories_added == 0 && self.tags_added == 0 && self.tags_updated == 0
    }
}

/// Where a pending category's parent lands in the local tree
enum ParentSlot {
    Resolved(Option<String>),
    Orphan(String),
    Pending,
}

/// Merge `foreign` into `store`.
///
/// Categories are processed as a worklist: a category whose parent is still
/// pending in the batch is deferred to the next pass. A pass without progress
/// ends the loop, and those categories (and their tags) are reported in
/// [`MergeReport::unresolved`].
pub fn merge(store: &mut Dictionary, foreign: &Dictionary, options: &MergeOptions) -> MergeReport {
    let mut report = MergeReport::default();

    let mut by_name_parent: HashMap<(String, Option<String>), String> = store
        .categories
        .iter()
        .map(|c| ((fold(&c.name), c.parent_id.clone()), c.id.clone()))
        .collect();

    let mut foreign_ids: HashSet<&str> = HashSet::new();
    let mut accepted: Vec<&Category> = Vec::with_capacity(foreign.categories.len());
    for category in &foreign.categories {
        if foreign_ids.insert(&category.id) {
            accepted.push(category);
        } else {
            warn!(
                id = %category.id,
                name = %category.name,
                "Duplicate category id in import; skipped"
            );
            report.warnings.push(MergeWarning::DuplicateForeignId {
                id: category.id.clone(),
                name: category.name.clone(),
            });
        }
    }

    // Foreign id -> local id
    let mut resolved: HashMap<&str, String> = HashMap::new();
    let mut pending = accepted.clone();
    let max_passes = accepted.len() * 2;
    let mut passes = 0;

    while !pending.is_empty() && passes < max_passes {
        passes += 1;
        let before = pending.len();
        let mut deferred = Vec::new();

        for category in pending {
            let name = match check_category_name(&category.name) {
                Ok(name) => name,
                Err(error) => {
                    warn!(name = %category.name, error = %error, "Imported category skipped");
                    report.warnings.push(MergeWarning::InvalidName {
                        name: category.name.clone(),
                        error,
                    });
                    report.unresolved.push(category.name.clone());
                    continue;
                }
            };

            let parent = match locate_parent(
                store,
                category.parent_id.as_deref(),
                &resolved,
                &foreign_ids,
                &by_name_parent,
                options,
            ) {
                ParentSlot::Resolved(parent) => parent,
                ParentSlot::Orphan(parent_id) => {
                    warn!(
                        name = %category.name,
                        parent_id = %parent_id,
                        "Imported category's parent not found; added at top level"
                    );
                    report.warnings.push(MergeWarning::OrphanPromoted {
                        name: category.name.clone(),
                        parent_id,
                    });
                    None
                }
                ParentSlot::Pending => {
                    deferred.push(category);
                    continue;
                }
            };

            let key = (fold(name), parent);
            let local_id = match by_name_parent.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let id = Ulid::new().to_string();
                    store.categories.push(Category {
                        id: id.clone(),
                        name: name.to_string(),
                        parent_id: key.1.clone(),
                        tags: Vec::new(),
                    });
                    by_name_parent.insert(key, id.clone());
                    report.categories_added += 1;
                    id
                }
            };
            resolved.insert(&category.id, local_id);
        }

        pending = deferred;
        if pending.len() == before {
            break;
        }
    }

    if !pending.is_empty() {
        warn!(remaining = pending.len(), "Import has unresolvable category dependencies");
        report.warnings.push(MergeWarning::UnresolvedDependency {
            remaining: pending.len(),
        });
        report.unresolved.extend(pending.iter().map(|c| c.name.clone()));
    }

    merge_tags(store, &accepted, &resolved, &mut report);

    info!(
        categories_added = report.categories_added,
        tags_added = report.tags_added,
        tags_updated = report.tags_updated,
        warnings = report.warnings.len(),
        "Dictionary merged"
    );
    report
}

fn locate_parent(
    store: &Dictionary,
    parent_id: Option<&str>,
    resolved: &HashMap<&str, String>,
    foreign_ids: &HashSet<&str>,
    by_name_parent: &HashMap<(String, Option<String>), String>,
    options: &MergeOptions,
) -> ParentSlot {
    let Some(parent_id) = parent_id else {
        return ParentSlot::Resolved(None);
    };

    if options.parent_alias.as_deref() == Some(parent_id) {
        let local = by_name_parent.get(&(fold(parent_id), None)).cloned();
        return ParentSlot::Resolved(local);
    }
    if let Some(local) = resolved.get(parent_id) {
        return ParentSlot::Resolved(Some(local.clone()));
    }
    if store.find_by_id(parent_id).is_some() {
        return ParentSlot::Resolved(Some(parent_id.to_string()));
    }
    if foreign_ids.contains(parent_id) {
        return ParentSlot::Pending;
    }
    ParentSlot::Orphan(parent_id.to_string())
}

/// Tags go to the resolved category unless their English name already exists
/// somewhere in the tree, in which case only the description is refreshed.
fn merge_tags(
    store: &mut Dictionary,
    accepted: &[&Category],
    resolved: &HashMap<&str, String>,
    report: &mut MergeReport,
) {
    let mut positions: HashMap<String, (usize, usize)> = HashMap::new();
    for (ci, category) in store.categories.iter().enumerate() {
        for (ti, tag) in category.tags.iter().enumerate() {
            positions.insert(fold(&tag.en), (ci, ti));
        }
    }

    for foreign_category in accepted {
        let Some(local_id) = resolved.get(foreign_category.id.as_str()) else {
            continue;
        };
        let Some(ci) = store.categories.iter().position(|c| &c.id == local_id) else {
            continue;
        };

        for foreign_tag in &foreign_category.tags {
            let en = foreign_tag.en.trim();
            if en.is_empty() {
                continue;
            }
            let ja = foreign_tag.ja.trim();

            match positions.get(&fold(en)) {
                Some(&(tci, tti)) => {
                    let tag = &mut store.categories[tci].tags[tti];
                    if tag.ja != ja {
                        debug!(tag = %tag.en, "Description updated from import");
                        tag.ja = ja.to_string();
                        report.tags_updated += 1;
                    }
                }
                None => {
                    let tags = &mut store.categories[ci].tags;
                    tags.push(Tag::new(en, ja));
                    positions.insert(fold(en), (ci, tags.len() - 1));
                    report.tags_added += 1;
                }
            }
        }
    }
}
