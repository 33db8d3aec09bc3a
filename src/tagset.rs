//! Tag-Set Assembly
//!
//! An ordered, de-duplicated selection of tags rendered as delimited text,
//! plus random sets drawn one tag per leaf category.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dictionary::{fold, Dictionary, DictionaryError, TagRow};

/// Default delimiter for rendered tag sets
pub const DEFAULT_DELIMITER: &str = ", ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagSetEntry {
    pub en: String,
    pub ja: String,
    pub category_path: String,
}

impl From<TagRow> for TagSetEntry {
    fn from(row: TagRow) -> Self {
        Self {
            en: row.en,
            ja: row.ja,
            category_path: row.category_path,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Ordered selection; English names are unique (case-insensitive)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagSet {
    entries: Vec<TagSetEntry>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TagSetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, en: &str) -> bool {
        let en_lower = fold(en);
        self.entries.iter().any(|e| fold(&e.en) == en_lower)
    }

    pub fn add(&mut self, entry: TagSetEntry) -> AddOutcome {
        if self.contains(&entry.en) {
            return AddOutcome::AlreadyPresent;
        }
        self.entries.push(entry);
        AddOutcome::Added
    }

    /// Swap with the previous entry; false at the top or out of range
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.entries.len() {
            return false;
        }
        self.entries.swap(index, index - 1);
        true
    }

    /// Swap with the next entry; false at the bottom or out of range
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.entries.len() {
            return false;
        }
        self.entries.swap(index, index + 1);
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<TagSetEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the selection, keeping the first of any duplicate names.
    /// Returns how many entries were kept.
    pub fn replace_all<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = TagSetEntry>,
    {
        self.clear();
        let mut kept = 0;
        for entry in entries {
            if self.add(entry) == AddOutcome::Added {
                kept += 1;
            }
        }
        kept
    }

    /// English names joined by `delimiter`, in order
    pub fn render(&self, delimiter: &str) -> String {
        self.entries
            .iter()
            .map(|e| e.en.as_str())
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}

/// Pick one tag uniformly at random from every leaf category that has tags.
///
/// Leaves without tags are skipped; an empty result means there is nothing
/// to generate.
pub fn random_set<R: Rng + ?Sized>(
    dictionary: &Dictionary,
    rng: &mut R,
) -> Result<Vec<TagSetEntry>, DictionaryError> {
    let mut picks = Vec::new();

    for leaf in dictionary.leaves() {
        let Some(tag) = leaf.tags.choose(&mut *rng) else {
            continue;
        };
        picks.push(TagSetEntry {
            en: tag.en.clone(),
            ja: tag.ja.clone(),
            category_path: dictionary.path(&leaf.id)?,
        });
    }

    if picks.is_empty() {
        warn!("No leaf category has tags; random set is empty");
    } else {
        debug!(count = picks.len(), "Random tag set generated");
    }
    Ok(picks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::fixture;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(en: &str) -> TagSetEntry {
        TagSetEntry {
            en: en.to_string(),
            ja: String::new(),
            category_path: String::new(),
        }
    }

    fn names(set: &TagSet) -> Vec<&str> {
        set.entries().iter().map(|e| e.en.as_str()).collect()
    }

    #[test]
    fn test_add_deduplicates() {
        let mut set = TagSet::new();
        assert_eq!(set.add(entry("1girl")), AddOutcome::Added);
        assert_eq!(set.add(entry("1GIRL")), AddOutcome::AlreadyPresent);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_reorder() {
        let mut set = TagSet::new();
        for en in ["a", "b", "c"] {
            set.add(entry(en));
        }

        assert!(set.move_up(2));
        assert_eq!(names(&set), vec!["a", "c", "b"]);
        assert!(set.move_down(0));
        assert_eq!(names(&set), vec!["c", "a", "b"]);

        // Boundaries are no-ops
        assert!(!set.move_up(0));
        assert!(!set.move_down(2));
        assert!(!set.move_up(9));
        assert!(!set.move_down(9));
        assert_eq!(names(&set), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut set = TagSet::new();
        set.add(entry("a"));
        set.add(entry("b"));
        assert_eq!(set.remove(0).unwrap().en, "a");
        assert!(set.remove(5).is_none());
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_render() {
        let mut set = TagSet::new();
        assert_eq!(set.render(DEFAULT_DELIMITER), "");
        set.add(entry("1girl"));
        set.add(entry("blue hair"));
        assert_eq!(set.render(DEFAULT_DELIMITER), "1girl, blue hair");
        assert_eq!(set.render("\n"), "1girl\nblue hair");
    }

    #[test]
    fn test_replace_all_drops_duplicates() {
        let mut set = TagSet::new();
        set.add(entry("old"));
        let kept = set.replace_all(vec![entry("x"), entry("y"), entry("X")]);
        assert_eq!(kept, 2);
        assert_eq!(names(&set), vec!["x", "y"]);
    }

    #[test]
    fn test_random_set_one_per_tagged_leaf() {
        let dict = fixture();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let picks = random_set(&dict, &mut rng).unwrap();
            // person, hair, clothes_state have tags; pose is an empty leaf
            assert_eq!(picks.len(), 3);
            let paths: Vec<&str> = picks.iter().map(|p| p.category_path.as_str()).collect();
            assert_eq!(paths, vec!["人物", "髪", "服装 / 状態"]);
            assert!(dict.find_by_id("person").unwrap().tags.iter().any(|t| t.en == picks[0].en));
            assert!(dict.find_by_id("hair").unwrap().tags.iter().any(|t| t.en == picks[1].en));
            assert_eq!(picks[2].en, "open shirt");
        }
    }

    #[test]
    fn test_random_set_empty_when_no_tags() {
        let mut dict = Dictionary::new();
        dict.add_category("empty", None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_set(&dict, &mut rng).unwrap().is_empty());
    }
}
