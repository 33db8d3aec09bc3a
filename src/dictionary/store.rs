//! Category Store
//!
//! Tree queries and structural mutations over the flat category list.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};
use ulid::Ulid;

use super::{fold, Category, Dictionary, DictionaryError, PATH_SEPARATOR};

/// Trimmed category name, or why it cannot be used. A name holding the path
/// separator would make its display path ambiguous.
pub(crate) fn check_category_name(name: &str) -> Result<&str, DictionaryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DictionaryError::EmptyName);
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(DictionaryError::NameContainsSeparator {
            name: name.to_string(),
        });
    }
    Ok(name)
}

impl Dictionary {
    pub fn find_by_id(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub(crate) fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Category> {
        self.categories.iter_mut().find(|c| c.id == id)
    }

    /// Display path of a category, root first, e.g. `服装 / 状態`.
    ///
    /// Returns an empty string for an unknown id. The walk is capped at the
    /// number of categories; exceeding it means the parent links form a cycle.
    pub fn path(&self, id: &str) -> Result<String, DictionaryError> {
        let mut names: Vec<&str> = Vec::new();
        let mut current = self.find_by_id(id);

        while let Some(category) = current {
            if names.len() >= self.categories.len() {
                return Err(DictionaryError::CyclicParentChain(id.to_string()));
            }
            names.push(&category.name);
            current = category
                .parent_id
                .as_deref()
                .and_then(|parent| self.find_by_id(parent));
        }

        names.reverse();
        Ok(names.join(PATH_SEPARATOR))
    }

    /// Direct children of a category, in store order
    pub fn children(&self, id: &str) -> Vec<&Category> {
        self.categories
            .iter()
            .filter(|c| c.parent_id.as_deref() == Some(id))
            .collect()
    }

    pub fn top_level(&self) -> Vec<&Category> {
        self.categories.iter().filter(|c| c.is_top_level()).collect()
    }

    /// Categories that are nobody's parent
    pub fn leaves(&self) -> Vec<&Category> {
        let parents: HashSet<&str> = self
            .categories
            .iter()
            .filter_map(|c| c.parent_id.as_deref())
            .collect();

        self.categories
            .iter()
            .filter(|c| !parents.contains(c.id.as_str()))
            .collect()
    }

    /// Parent id -> child categories, rebuilt on every call
    pub fn children_index(&self) -> HashMap<&str, Vec<&Category>> {
        let mut index: HashMap<&str, Vec<&Category>> = HashMap::new();
        for category in &self.categories {
            if let Some(parent) = category.parent_id.as_deref() {
                index.entry(parent).or_default().push(category);
            }
        }
        index
    }

    /// Find a category by sibling scope and case-insensitive name
    pub fn find_sibling(&self, name: &str, parent_id: Option<&str>) -> Option<&Category> {
        let name_lower = fold(name);
        self.categories
            .iter()
            .find(|c| c.parent_id.as_deref() == parent_id && fold(&c.name) == name_lower)
    }

    /// Create a category under `parent_id` (or at the top level).
    pub fn add_category(
        &mut self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Category, DictionaryError> {
        let name = check_category_name(name)?;

        if let Some(parent) = parent_id {
            if self.find_by_id(parent).is_none() {
                return Err(DictionaryError::CategoryNotFound(parent.to_string()));
            }
        }

        if self.find_sibling(name, parent_id).is_some() {
            return Err(DictionaryError::DuplicateName {
                name: name.to_string(),
            });
        }

        let category = Category {
            id: Ulid::new().to_string(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            tags: Vec::new(),
        };
        self.categories.push(category.clone());

        info!(
            id = %category.id,
            name = %category.name,
            parent = ?category.parent_id,
            "Category added"
        );
        Ok(category)
    }

    /// Delete an empty leaf category and return it.
    pub fn delete_category(&mut self, id: &str) -> Result<Category, DictionaryError> {
        let position = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| DictionaryError::CategoryNotFound(id.to_string()))?;

        let category = &self.categories[position];

        let child_count = self.children(id).len();
        if child_count > 0 {
            return Err(DictionaryError::HasChildren {
                name: category.name.clone(),
                count: child_count,
            });
        }

        if !category.tags.is_empty() {
            return Err(DictionaryError::HasTags {
                name: category.name.clone(),
                count: category.tags.len(),
            });
        }

        let removed = self.categories.remove(position);
        info!(id = %removed.id, name = %removed.name, "Category deleted");
        Ok(removed)
    }

    /// Inverse of [`Dictionary::path`]: walk the segments from the top level,
    /// matching names exactly at each level.
    pub fn resolve_path(&self, path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }

        let mut parent: Option<&str> = None;
        for segment in path.split(PATH_SEPARATOR) {
            let found = self
                .categories
                .iter()
                .find(|c| c.parent_id.as_deref() == parent && c.name == segment)?;
            parent = Some(&found.id);
        }

        parent.map(str::to_string)
    }

    /// Check the structural invariants: unique ids, resolvable parents, no cycles.
    pub fn validate(&self) -> Result<(), DictionaryError> {
        let mut ids: HashSet<&str> = HashSet::with_capacity(self.categories.len());
        for category in &self.categories {
            if !ids.insert(&category.id) {
                return Err(DictionaryError::DuplicateId(category.id.clone()));
            }
        }

        for category in &self.categories {
            if let Some(parent) = category.parent_id.as_deref() {
                if !ids.contains(parent) {
                    return Err(DictionaryError::DanglingParent {
                        id: category.id.clone(),
                        parent_id: parent.to_string(),
                    });
                }
            }
        }

        for category in &self.categories {
            self.path(&category.id)?;
        }

        debug!(categories = self.categories.len(), "Dictionary validated");
        Ok(())
    }
}
