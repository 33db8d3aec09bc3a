//! Read-only views over the dictionary: tag search, subtree listings,
//! the nested outline and summary stats.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::{fold, Category, Dictionary, DictionaryError};

/// A tag together with where it lives
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagRow {
    pub en: String,
    pub ja: String,
    pub category_id: String,
    pub category_path: String,
}

/// Nested view of one category and its descendants
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub tag_count: usize,
    pub children: Vec<CategoryNode>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryStats {
    pub categories: usize,
    pub top_level: usize,
    pub leaves: usize,
    pub tags: usize,
    pub untranslated: usize,
}

impl Dictionary {
    /// Ids of `id` and all its descendants, depth-first, parent before children
    pub fn subtree_ids(&self, id: &str) -> Vec<&str> {
        let Some(root) = self.find_by_id(id) else {
            return Vec::new();
        };

        let index = self.children_index();
        let mut ids = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root.id.as_str()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            ids.push(current);
            if let Some(children) = index.get(current) {
                // Reverse so the first child is visited first
                stack.extend(children.iter().rev().map(|c| c.id.as_str()));
            }
        }

        ids
    }

    /// Tags of a category followed by those of its descendants
    pub fn tags_in_subtree(&self, id: &str) -> Result<Vec<TagRow>, DictionaryError> {
        let mut rows = Vec::new();
        for category_id in self.subtree_ids(id) {
            if let Some(category) = self.find_by_id(category_id) {
                rows.extend(self.rows_for(category)?);
            }
        }
        Ok(rows)
    }

    /// Tags whose English name or description contains `query`
    /// (case-insensitive), optionally restricted to the subtree under `under`.
    pub fn search_tags(
        &self,
        query: &str,
        under: Option<&str>,
    ) -> Result<Vec<TagRow>, DictionaryError> {
        let query_lower = fold(query.trim());

        let rows = match under {
            Some(id) => self.tags_in_subtree(id)?,
            None => {
                let mut rows = Vec::with_capacity(self.tag_count());
                for category in &self.categories {
                    rows.extend(self.rows_for(category)?);
                }
                rows
            }
        };

        Ok(rows
            .into_iter()
            .filter(|row| {
                query_lower.is_empty()
                    || fold(&row.en).contains(&query_lower)
                    || fold(&row.ja).contains(&query_lower)
            })
            .collect())
    }

    /// Nested category tree from the top level. With a query, only subtrees
    /// whose category name or tags match are kept.
    pub fn outline(&self, query: Option<&str>) -> Vec<CategoryNode> {
        let query_lower = query.map(|q| fold(q.trim())).filter(|q| !q.is_empty());
        let index = self.children_index();
        let mut visited = HashSet::new();

        self.top_level()
            .into_iter()
            .filter_map(|category| {
                build_node(category, &index, query_lower.as_deref(), &mut visited)
            })
            .collect()
    }

    pub fn stats(&self) -> DictionaryStats {
        DictionaryStats {
            categories: self.categories.len(),
            top_level: self.top_level().len(),
            leaves: self.leaves().len(),
            tags: self.tag_count(),
            untranslated: self.untranslated().len(),
        }
    }

    fn rows_for(&self, category: &Category) -> Result<Vec<TagRow>, DictionaryError> {
        let category_path = self.path(&category.id)?;
        Ok(category
            .tags
            .iter()
            .map(|tag| TagRow {
                en: tag.en.clone(),
                ja: tag.ja.clone(),
                category_id: category.id.clone(),
                category_path: category_path.clone(),
            })
            .collect())
    }
}

fn build_node<'a>(
    category: &'a Category,
    index: &HashMap<&str, Vec<&'a Category>>,
    query: Option<&str>,
    visited: &mut HashSet<&'a str>,
) -> Option<CategoryNode> {
    if !visited.insert(&category.id) {
        return None;
    }

    let children: Vec<CategoryNode> = index
        .get(category.id.as_str())
        .map(|children| {
            children
                .iter()
                .filter_map(|child| build_node(*child, index, query, visited))
                .collect()
        })
        .unwrap_or_default();

    if let Some(query) = query {
        let matches_self = fold(&category.name).contains(query)
            || category
                .tags
                .iter()
                .any(|t| fold(&t.en).contains(query) || fold(&t.ja).contains(query));
        if !matches_self && children.is_empty() {
            return None;
        }
    }

    Some(CategoryNode {
        id: category.id.clone(),
        name: category.name.clone(),
        tag_count: category.tags.len(),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::fixture;

    #[test]
    fn test_subtree_ids() {
        let mut dict = fixture();
        let sleeves = dict.add_category("袖", Some("clothes_state")).unwrap();
        assert_eq!(
            dict.subtree_ids("clothes"),
            vec!["clothes", "clothes_state", sleeves.id.as_str()]
        );
        assert!(dict.subtree_ids("missing").is_empty());
    }

    #[test]
    fn test_tags_in_subtree() {
        let dict = fixture();
        let rows = dict.tags_in_subtree("clothes").unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.en.as_str()).collect();
        assert_eq!(names, vec!["shirt", "skirt", "open shirt"]);
        assert_eq!(rows[2].category_path, "服装 / 状態");
    }

    #[test]
    fn test_search_tags_matches_both_languages() {
        let dict = fixture();

        let by_en: Vec<String> = dict
            .search_tags("SHIRT", None)
            .unwrap()
            .into_iter()
            .map(|r| r.en)
            .collect();
        assert_eq!(by_en, vec!["shirt", "open shirt"]);

        let by_ja = dict.search_tags("青", None).unwrap();
        assert_eq!(by_ja.len(), 1);
        assert_eq!(by_ja[0].en, "blue hair");

        let scoped = dict.search_tags("shirt", Some("clothes_state")).unwrap();
        assert_eq!(scoped.len(), 1);

        assert_eq!(dict.search_tags("", None).unwrap().len(), dict.tag_count());
    }

    #[test]
    fn test_outline_nests_children() {
        let dict = fixture();
        let outline = dict.outline(None);
        assert_eq!(outline.len(), 4);
        let clothes = outline.iter().find(|n| n.id == "clothes").unwrap();
        assert_eq!(clothes.tag_count, 2);
        assert_eq!(clothes.children.len(), 1);
        assert_eq!(clothes.children[0].name, "状態");
    }

    #[test]
    fn test_outline_filters_by_query() {
        let dict = fixture();
        let outline = dict.outline(Some("open"));
        assert_eq!(outline.len(), 1);
        assert_eq!(outline[0].id, "clothes");
        assert_eq!(outline[0].children[0].id, "clothes_state");

        assert!(dict.outline(Some("zzz")).is_empty());
        assert_eq!(dict.outline(Some("  ")).len(), 4);
    }

    #[test]
    fn test_stats() {
        let dict = fixture();
        assert_eq!(
            dict.stats(),
            DictionaryStats {
                categories: 5,
                top_level: 4,
                leaves: 4,
                tags: 8,
                untranslated: 0,
            }
        );
    }
}
