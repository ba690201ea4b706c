//! Exact-match secondary index: term → set of store keys.

use crate::kind::Term;
use std::collections::{HashMap, HashSet};

/// Hash index: `term -> keys` bucket map.
#[derive(Debug, Default)]
pub struct HashIndex {
    buckets: HashMap<Term, HashSet<String>>,
}

impl HashIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` to the bucket for `term`.
    pub fn insert(&mut self, term: Term, key: String) {
        self.buckets.entry(term).or_default().insert(key);
    }

    /// Remove `key` from the bucket for `term`, dropping the bucket if it's
    /// now empty.
    pub fn remove(&mut self, term: &Term, key: &str) {
        if let Some(bucket) = self.buckets.get_mut(term) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.buckets.remove(term);
            }
        }
    }

    /// Keys whose value equals `term`.
    pub fn lookup_eq(&self, term: &Term) -> Vec<String> {
        self.buckets.get(term).map(|b| b.iter().cloned().collect()).unwrap_or_default()
    }

    /// Number of distinct terms tracked.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if no term is tracked.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_eq_returns_matching_keys() {
        let mut index = HashIndex::new();
        index.insert(Term::Str("admin".into()), "u1".into());
        index.insert(Term::Str("admin".into()), "u2".into());
        index.insert(Term::Str("guest".into()), "u3".into());

        let mut admins = index.lookup_eq(&Term::Str("admin".into()));
        admins.sort();
        assert_eq!(admins, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn remove_drops_empty_bucket() {
        let mut index = HashIndex::new();
        index.insert(Term::Num(1.0), "a".into());
        index.remove(&Term::Num(1.0), "a");
        assert!(index.is_empty());
    }

    #[test]
    fn lookup_missing_term_is_empty() {
        let index = HashIndex::new();
        assert!(index.lookup_eq(&Term::Bool(true)).is_empty());
    }
}
