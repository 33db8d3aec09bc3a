//! Classification Hints
//!
//! Ranks where an unknown tag string probably belongs, using only
//! deterministic string heuristics against the dictionary.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, error};

use crate::dictionary::{fold, Category, Dictionary, Tag};

/// Confidence of each match kind
pub const CONFIDENCE_EXACT: f32 = 1.0;
pub const CONFIDENCE_TAG_CONTAINS_INPUT: f32 = 0.8;
pub const CONFIDENCE_INPUT_CONTAINS_TAG: f32 = 0.7;
pub const CONFIDENCE_CATEGORY_WORD: f32 = 0.6;
pub const CONFIDENCE_TAG_WORD: f32 = 0.5;

/// A dictionary tag that produced a hint
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatchedTag {
    pub en: String,
    pub ja: String,
}

/// One ranked suggestion
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "matchType", rename_all = "snake_case")]
pub enum Hint {
    /// Input equals a dictionary tag
    #[serde(rename_all = "camelCase")]
    Exact {
        category_id: String,
        category_path: String,
        tag: MatchedTag,
    },
    /// A dictionary tag contains the input
    #[serde(rename_all = "camelCase")]
    TagContainsInput {
        category_id: String,
        category_path: String,
        tag: MatchedTag,
    },
    /// The input contains a dictionary tag
    #[serde(rename_all = "camelCase")]
    InputContainsTag {
        category_id: String,
        category_path: String,
        tag: MatchedTag,
    },
    /// A word of the input appears in a category name
    #[serde(rename_all = "camelCase")]
    CategoryWord {
        category_id: String,
        category_path: String,
    },
    /// A word of the input equals a word of a dictionary tag
    #[serde(rename_all = "camelCase")]
    TagWord {
        category_id: String,
        category_path: String,
        tag: MatchedTag,
    },
}

impl Hint {
    pub fn confidence(&self) -> f32 {
        match self {
            Hint::Exact { .. } => CONFIDENCE_EXACT,
            Hint::TagContainsInput { .. } => CONFIDENCE_TAG_CONTAINS_INPUT,
            Hint::InputContainsTag { .. } => CONFIDENCE_INPUT_CONTAINS_TAG,
            Hint::CategoryWord { .. } => CONFIDENCE_CATEGORY_WORD,
            Hint::TagWord { .. } => CONFIDENCE_TAG_WORD,
        }
    }

    pub fn category_id(&self) -> &str {
        match self {
            Hint::Exact { category_id, .. }
            | Hint::TagContainsInput { category_id, .. }
            | Hint::InputContainsTag { category_id, .. }
            | Hint::CategoryWord { category_id, .. }
            | Hint::TagWord { category_id, .. } => category_id,
        }
    }

    pub fn category_path(&self) -> &str {
        match self {
            Hint::Exact { category_path, .. }
            | Hint::TagContainsInput { category_path, .. }
            | Hint::InputContainsTag { category_path, .. }
            | Hint::CategoryWord { category_path, .. }
            | Hint::TagWord { category_path, .. } => category_path,
        }
    }

    pub fn matched_tag(&self) -> Option<&MatchedTag> {
        match self {
            Hint::Exact { tag, .. }
            | Hint::TagContainsInput { tag, .. }
            | Hint::InputContainsTag { tag, .. }
            | Hint::TagWord { tag, .. } => Some(tag),
            Hint::CategoryWord { .. } => None,
        }
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            Hint::Exact { .. } => "exact",
            Hint::TagContainsInput { .. } => "tag contains input",
            Hint::InputContainsTag { .. } => "input contains tag",
            Hint::CategoryWord { .. } => "word in category name",
            Hint::TagWord { .. } => "word in dictionary tag",
        }
    }
}

/// Split on the tag word separators: space, underscore and hyphen
pub fn split_words(s: &str) -> impl Iterator<Item = &str> {
    s.split([' ', '_', '-']).filter(|w| !w.is_empty())
}

/// Rank candidate categories/tags for `tag_string`.
///
/// An exact match returns that single hint. Otherwise hints are collected in
/// category-then-tag order, sorted by confidence (stable) and de-duplicated on
/// `(category, matched tag)`.
pub fn hint(dictionary: &Dictionary, tag_string: &str) -> Vec<Hint> {
    let input = fold(tag_string.trim());
    if input.is_empty() {
        return Vec::new();
    }

    let paths = PathCache::new(dictionary);

    for category in &dictionary.categories {
        if let Some(tag) = category.tags.iter().find(|t| fold(&t.en) == input) {
            debug!(input = %tag_string, category = %category.id, "Exact hint");
            return vec![Hint::Exact {
                category_id: category.id.clone(),
                category_path: paths.get(category),
                tag: matched(tag),
            }];
        }
    }

    let mut hints = Vec::new();

    for category in &dictionary.categories {
        for tag in &category.tags {
            let tag_lower = fold(&tag.en);
            if tag_lower.contains(&input) {
                hints.push(Hint::TagContainsInput {
                    category_id: category.id.clone(),
                    category_path: paths.get(category),
                    tag: matched(tag),
                });
            }
            if input.contains(&tag_lower) {
                hints.push(Hint::InputContainsTag {
                    category_id: category.id.clone(),
                    category_path: paths.get(category),
                    tag: matched(tag),
                });
            }
        }
    }

    for word in split_words(&input) {
        for category in &dictionary.categories {
            if fold(&category.name).contains(word) {
                hints.push(Hint::CategoryWord {
                    category_id: category.id.clone(),
                    category_path: paths.get(category),
                });
            }
            for tag in &category.tags {
                let tag_lower = fold(&tag.en);
                if split_words(&tag_lower).any(|w| w == word) {
                    hints.push(Hint::TagWord {
                        category_id: category.id.clone(),
                        category_path: paths.get(category),
                        tag: matched(tag),
                    });
                }
            }
        }
    }

    // Stable: equal confidences keep discovery order
    hints.sort_by(|a, b| {
        b.confidence()
            .partial_cmp(&a.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    hints.retain(|hint| {
        seen.insert((
            hint.category_id().to_string(),
            hint.matched_tag().map(|t| t.en.clone()),
        ))
    });

    debug!(input = %tag_string, hits = hints.len(), "Classification hints");
    hints
}

fn matched(tag: &Tag) -> MatchedTag {
    MatchedTag {
        en: tag.en.clone(),
        ja: tag.ja.clone(),
    }
}

/// Category paths computed once per hint run
struct PathCache<'a> {
    dictionary: &'a Dictionary,
    paths: RefCell<HashMap<&'a str, String>>,
}

impl<'a> PathCache<'a> {
    fn new(dictionary: &'a Dictionary) -> Self {
        Self {
            dictionary,
            paths: Default::default(),
        }
    }

    fn get(&self, category: &'a Category) -> String {
        self.paths
            .borrow_mut()
            .entry(&category.id)
            .or_insert_with(|| match self.dictionary.path(&category.id) {
                Ok(path) => path,
                Err(e) => {
                    // Loaded dictionaries are validated, so this is a broken invariant
                    error!(category = %category.id, error = %e, "Cannot compute category path");
                    String::new()
                }
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::fixture;

    #[test]
    fn test_exact_match_short_circuits() {
        let dict = fixture();
        for input in ["1girl", "1GIRL", "  1Girl "] {
            let hints = hint(&dict, input);
            assert_eq!(hints.len(), 1, "input {:?}", input);
            assert_eq!(hints[0].confidence(), CONFIDENCE_EXACT);
            assert_eq!(hints[0].category_id(), "person");
            assert_eq!(hints[0].matched_tag().unwrap().en, "1girl");
        }
    }

    #[test]
    fn test_exact_match_ignores_earlier_partial_matches() {
        let dict = fixture();
        // "shirt" is contained in the input and is seen before "open shirt"
        let hints = hint(&dict, "open shirt");
        assert_eq!(hints.len(), 1);
        assert!(matches!(hints[0], Hint::Exact { .. }));
    }

    #[test]
    fn test_containment_is_asymmetric() {
        let dict = fixture();

        // "pony" is contained by "ponytail"
        let hints = hint(&dict, "pony");
        assert!(matches!(hints[0], Hint::TagContainsInput { .. }));
        assert_eq!(hints[0].confidence(), CONFIDENCE_TAG_CONTAINS_INPUT);

        // "ponytail ribbon" contains "ponytail"
        let hints = hint(&dict, "ponytail ribbon");
        assert!(matches!(hints[0], Hint::InputContainsTag { .. }));
        assert_eq!(hints[0].confidence(), CONFIDENCE_INPUT_CONTAINS_TAG);
    }

    #[test]
    fn test_ranking_and_dedupe_for_compound_tag() {
        let dict = fixture();
        let hints = hint(&dict, "blue_hair_ribbon");

        assert!(!hints.is_empty());
        for pair in hints.windows(2) {
            assert!(pair[0].confidence() >= pair[1].confidence());
        }

        // "hair" is contained in the input, "blue hair" only shares words
        assert!(matches!(&hints[0], Hint::InputContainsTag { tag, .. } if tag.en == "hair"));
        let blue = hints
            .iter()
            .find(|h| h.matched_tag().map(|t| t.en.as_str()) == Some("blue hair"))
            .unwrap();
        assert_eq!(blue.confidence(), CONFIDENCE_TAG_WORD);

        let mut keys = HashSet::new();
        for h in &hints {
            let key = (h.category_id().to_string(), h.matched_tag().map(|t| t.en.clone()));
            assert!(keys.insert(key));
        }
    }

    #[test]
    fn test_category_word_ranks_between_containment_and_tag_word() {
        let mut dict = fixture();
        let ribbon = dict.add_category("Ribbon", None).unwrap();

        // "ribbon" appears twice but the category hint is kept once
        let hints = hint(&dict, "ribbon_blue_hair_ribbon");
        assert_eq!(
            hints,
            vec![
                Hint::InputContainsTag {
                    category_id: "hair".to_string(),
                    category_path: "髪".to_string(),
                    tag: MatchedTag {
                        en: "hair".to_string(),
                        ja: "髪".to_string(),
                    },
                },
                Hint::CategoryWord {
                    category_id: ribbon.id.clone(),
                    category_path: "Ribbon".to_string(),
                },
                Hint::TagWord {
                    category_id: "hair".to_string(),
                    category_path: "髪".to_string(),
                    tag: MatchedTag {
                        en: "blue hair".to_string(),
                        ja: "青髪".to_string(),
                    },
                },
            ]
        );
        let confidences: Vec<f32> = hints.iter().map(Hint::confidence).collect();
        assert_eq!(
            confidences,
            vec![
                CONFIDENCE_INPUT_CONTAINS_TAG,
                CONFIDENCE_CATEGORY_WORD,
                CONFIDENCE_TAG_WORD
            ]
        );
    }

    #[test]
    fn test_category_word_match() {
        let mut dict = Dictionary::new();
        let hair = dict.add_category("Hair Styles", None).unwrap();
        let hints = hint(&dict, "messy-hair");
        assert_eq!(
            hints,
            vec![Hint::CategoryWord {
                category_id: hair.id.clone(),
                category_path: "Hair Styles".to_string(),
            }]
        );
    }

    #[test]
    fn test_tag_word_requires_whole_token() {
        let dict = fixture();
        // "shirts" shares no whole token with any tag and is not a substring match
        let hints = hint(&dict, "shirts_x");
        assert!(hints.iter().all(|h| !matches!(h, Hint::TagWord { .. })));

        let hints = hint(&dict, "red-skirt");
        assert!(hints
            .iter()
            .any(|h| matches!(h, Hint::InputContainsTag { tag, .. } if tag.en == "skirt")));
    }

    #[test]
    fn test_equal_confidence_keeps_discovery_order() {
        let dict = fixture();
        let hints = hint(&dict, "hir");
        let order: Vec<&str> = hints
            .iter()
            .map(|h| h.matched_tag().unwrap().en.as_str())
            .collect();
        assert_eq!(order, vec!["shirt", "open shirt"]);
    }

    #[test]
    fn test_no_match_and_empty_input() {
        let dict = fixture();
        assert!(hint(&dict, "zzzz").is_empty());
        assert!(hint(&dict, "   ").is_empty());
        assert!(hint(&Dictionary::new(), "anything").is_empty());
    }

    #[test]
    fn test_hint_paths() {
        let dict = fixture();
        let hints = hint(&dict, "open");
        assert_eq!(hints[0].category_path(), "服装 / 状態");
    }

    #[test]
    fn test_split_words() {
        let words: Vec<&str> = split_words("a_b-c  d").collect();
        assert_eq!(words, vec!["a", "b", "c", "d"]);
    }
}
