//! Read-only view of the existing corpus, used for uniqueness checks.
//!
//! The validator never performs I/O. Callers hand it a [`CorpusLookup`]:
//! the application crate loads a [`CorpusIndex`] from SQLite before a run,
//! tests build one in memory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity of one stored ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub id: String,
    pub slug: String,
    pub name: String,
}

impl CorpusEntry {
    pub fn new(id: impl Into<String>, slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: name.into(),
        }
    }
}

/// Oracle answering "does this already exist?".
///
/// Name lookups are case-insensitive; slug and id lookups are exact.
pub trait CorpusLookup: Send + Sync {
    fn find_by_slug(&self, slug: &str) -> Option<CorpusEntry>;
    fn find_by_name(&self, name: &str) -> Option<CorpusEntry>;
    fn find_by_id(&self, id: &str) -> Option<CorpusEntry>;
}

/// A corpus with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCorpus;

impl CorpusLookup for EmptyCorpus {
    fn find_by_slug(&self, _slug: &str) -> Option<CorpusEntry> {
        None
    }

    fn find_by_name(&self, _name: &str) -> Option<CorpusEntry> {
        None
    }

    fn find_by_id(&self, _id: &str) -> Option<CorpusEntry> {
        None
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// In-memory [`CorpusLookup`] keyed by id, slug, and folded name.
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    by_id: HashMap<String, CorpusEntry>,
    slug_to_id: HashMap<String, String>,
    name_to_id: HashMap<String, String>,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry. Replacing an id drops its old slug and name.
    pub fn insert(&mut self, entry: CorpusEntry) {
        self.remove(&entry.id);
        self.slug_to_id.insert(entry.slug.clone(), entry.id.clone());
        self.name_to_id.insert(name_key(&entry.name), entry.id.clone());
        self.by_id.insert(entry.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<CorpusEntry> {
        let old = self.by_id.remove(id)?;
        if self.slug_to_id.get(&old.slug).is_some_and(|owner| owner == id) {
            self.slug_to_id.remove(&old.slug);
        }
        let key = name_key(&old.name);
        if self.name_to_id.get(&key).is_some_and(|owner| owner == id) {
            self.name_to_id.remove(&key);
        }
        Some(old)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<CorpusEntry> for CorpusIndex {
    fn from_iter<I: IntoIterator<Item = CorpusEntry>>(iter: I) -> Self {
        let mut index = CorpusIndex::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}

impl CorpusLookup for CorpusIndex {
    fn find_by_slug(&self, slug: &str) -> Option<CorpusEntry> {
        self.slug_to_id
            .get(slug)
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }

    fn find_by_name(&self, name: &str) -> Option<CorpusEntry> {
        self.name_to_id
            .get(&name_key(name))
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }

    fn find_by_id(&self, id: &str) -> Option<CorpusEntry> {
        self.by_id.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_by_each_key() {
        let index: CorpusIndex =
            [CorpusEntry::new("id-1", "inulin", "Inulin")].into_iter().collect();
        assert_eq!(index.find_by_slug("inulin").unwrap().id, "id-1");
        assert_eq!(index.find_by_name("  INULIN ").unwrap().id, "id-1");
        assert_eq!(index.find_by_id("id-1").unwrap().slug, "inulin");
        assert!(index.find_by_slug("Inulin").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn reinserting_an_id_replaces_its_keys() {
        let mut index = CorpusIndex::new();
        index.insert(CorpusEntry::new("id-1", "fos", "FOS"));
        index.insert(CorpusEntry::new("id-1", "fructooligosaccharides", "Fructooligosaccharides"));
        assert!(index.find_by_slug("fos").is_none());
        assert!(index.find_by_name("fos").is_none());
        assert_eq!(index.find_by_slug("fructooligosaccharides").unwrap().id, "id-1");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_only_clears_own_keys() {
        let mut index = CorpusIndex::new();
        index.insert(CorpusEntry::new("a", "kefir", "Kefir"));
        assert!(index.remove("a").is_some());
        assert!(index.is_empty());
        assert!(index.remove("a").is_none());
        assert!(EmptyCorpus.find_by_slug("kefir").is_none());
    }
}
