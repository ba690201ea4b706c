//! Tokenised substring index: lowercase word token → set of store keys.
//!
//! Supports `contains`, `startsWith`, `endsWith` by scanning the distinct
//! token set (§4.3: "O(tokens), acceptable for the target scale"). This is
//! membership, not relevance ranking — full-text scoring is out of scope.

use crate::tokenizer::tokenize;
use std::collections::{HashMap, HashSet};

/// Text index: `token -> keys`, plus the raw token set per key so a value
/// can be removed without re-tokenising its old content from elsewhere.
#[derive(Debug, Default)]
pub struct TextIndex {
    postings: HashMap<String, HashSet<String>>,
    tokens_by_key: HashMap<String, HashSet<String>>,
}

impl TextIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenise `text` and index every token under `key`, replacing
    /// whatever `key` was previously indexed under.
    pub fn insert(&mut self, key: &str, text: &str) {
        self.remove(key);
        let tokens: HashSet<String> = tokenize(text).into_iter().collect();
        for token in &tokens {
            self.postings.entry(token.clone()).or_default().insert(key.to_string());
        }
        self.tokens_by_key.insert(key.to_string(), tokens);
    }

    /// Remove every token association for `key`.
    pub fn remove(&mut self, key: &str) {
        let Some(tokens) = self.tokens_by_key.remove(key) else { return };
        for token in tokens {
            if let Some(keys) = self.postings.get_mut(&token) {
                keys.remove(key);
                if keys.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }

    /// Keys with at least one token containing `needle`. Tokens are
    /// lowercase; callers should lowercase `needle` the same way.
    pub fn contains(&self, needle: &str) -> Vec<String> {
        self.matching(|token| token.contains(needle))
    }

    /// Keys with at least one token starting with `prefix` (lowercase).
    pub fn starts_with(&self, prefix: &str) -> Vec<String> {
        self.matching(|token| token.starts_with(prefix))
    }

    /// Keys with at least one token ending with `suffix` (lowercase).
    pub fn ends_with(&self, suffix: &str) -> Vec<String> {
        self.matching(|token| token.ends_with(suffix))
    }

    fn matching(&self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        let mut keys = HashSet::new();
        for (token, bucket) in self.postings.iter() {
            if predicate(token) {
                keys.extend(bucket.iter().cloned());
            }
        }
        keys.into_iter().collect()
    }

    /// True if no key is indexed.
    pub fn is_empty(&self) -> bool {
        self.tokens_by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_matches_substring_within_token() {
        let mut index = TextIndex::new();
        index.insert("doc1", "The Quick Brown Fox");
        assert_eq!(index.contains("quick"), vec!["doc1".to_string()]);
        assert!(index.contains("zzz").is_empty());
    }

    #[test]
    fn starts_with_and_ends_with() {
        let mut index = TextIndex::new();
        index.insert("doc1", "hello world");
        assert_eq!(index.starts_with("wor"), vec!["doc1".to_string()]);
        assert_eq!(index.ends_with("llo"), vec!["doc1".to_string()]);
    }

    #[test]
    fn remove_drops_all_token_associations() {
        let mut index = TextIndex::new();
        index.insert("doc1", "hello world");
        index.remove("doc1");
        assert!(index.is_empty());
        assert!(index.contains("hello").is_empty());
    }

    #[test]
    fn reinsert_replaces_previous_tokens() {
        let mut index = TextIndex::new();
        index.insert("doc1", "hello world");
        index.insert("doc1", "goodbye");
        assert!(index.contains("hello").is_empty());
        assert_eq!(index.contains("goodbye"), vec!["doc1".to_string()]);
    }
}
