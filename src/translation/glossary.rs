use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Running glossary of a translation job
///
/// Maps a source term to the translation chosen the first time it was seen.
/// Entries are never overwritten, so later windows cannot drift away from a
/// name or term once it has been settled. Reads take a snapshot and never
/// block on each other.
#[derive(Debug, Default)]
pub struct Glossary {
    terms: RwLock<BTreeMap<String, String>>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a term unless it is already known
    ///
    /// Returns `true` when the term was added. Blank terms are ignored.
    pub fn insert(&self, source: impl Into<String>, target: impl Into<String>) -> bool {
        let source = source.into().trim().to_string();
        let target = target.into().trim().to_string();
        if source.is_empty() || target.is_empty() {
            return false;
        }

        let mut terms = self.terms.write();
        if terms.contains_key(&source) {
            return false;
        }
        terms.insert(source, target);
        true
    }

    /// Record every new term, returns how many were added
    pub fn merge<I>(&self, new_terms: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let added = new_terms
            .into_iter()
            .filter(|(source, target)| self.insert(source.as_str(), target.as_str()))
            .count();
        if added > 0 {
            debug!("Glossary grew by {} term(s) to {}", added, self.len());
        }
        added
    }

    pub fn get(&self, source: &str) -> Option<String> {
        self.terms.read().get(source).cloned()
    }

    /// Copy of the current terms, sorted by source term
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.terms.read().clone()
    }

    pub fn len(&self) -> usize {
        self.terms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.read().is_empty()
    }
}
