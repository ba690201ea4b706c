//! Ordered secondary index: sorted terms plus a term → keys bucket map.
//!
//! Comparison queries (`>`, `>=`, `<`, `<=`) locate the boundary term with a
//! binary search over the sorted sequence rather than scanning every term.

use crate::kind::{Operator, Term};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Range index over a single field. Only the first type seen (number or
/// string) is indexed; later inserts of a different type are skipped by the
/// caller before they reach here (B3: type-incompatible values stay
/// queryable by scan, not by this index).
#[derive(Debug, Default)]
pub struct RangeIndex {
    sorted: Vec<Term>,
    buckets: HashMap<Term, HashSet<String>>,
}

impl RangeIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `term` is type-compatible with whatever this index already
    /// holds (or the index is empty, making any scalar type acceptable).
    pub fn accepts(&self, term: &Term) -> bool {
        self.sorted.first().map(|existing| existing.same_kind(term)).unwrap_or(true)
    }

    /// Insert `key` under `term`, keeping the sorted sequence in order.
    /// Caller must have checked [`RangeIndex::accepts`] first.
    pub fn insert(&mut self, term: Term, key: String) {
        if !self.buckets.contains_key(&term) {
            let pos = self.sorted.partition_point(|t| t.cmp_ordered(&term) == Ordering::Less);
            self.sorted.insert(pos, term.clone());
        }
        self.buckets.entry(term).or_default().insert(key);
    }

    /// Remove `key` from `term`'s bucket, dropping the term from the sorted
    /// sequence once its bucket is empty.
    pub fn remove(&mut self, term: &Term, key: &str) {
        let Some(bucket) = self.buckets.get_mut(term) else { return };
        bucket.remove(key);
        if bucket.is_empty() {
            self.buckets.remove(term);
            if let Some(pos) = self.sorted.iter().position(|t| t == term) {
                self.sorted.remove(pos);
            }
        }
    }

    /// Keys satisfying `op` against `bound`, in ascending term order.
    pub fn query(&self, op: Operator, bound: &Term) -> Vec<String> {
        let range: &[Term] = match op {
            Operator::Gt => {
                let idx = self.sorted.partition_point(|t| t.cmp_ordered(bound) != Ordering::Greater);
                &self.sorted[idx..]
            }
            Operator::Gte => {
                let idx = self.sorted.partition_point(|t| t.cmp_ordered(bound) == Ordering::Less);
                &self.sorted[idx..]
            }
            Operator::Lt => {
                let idx = self.sorted.partition_point(|t| t.cmp_ordered(bound) == Ordering::Less);
                &self.sorted[..idx]
            }
            Operator::Lte => {
                let idx = self.sorted.partition_point(|t| t.cmp_ordered(bound) != Ordering::Greater);
                &self.sorted[..idx]
            }
            _ => return Vec::new(),
        };
        range.iter().flat_map(|t| self.buckets.get(t).into_iter().flatten().cloned()).collect()
    }

    /// True if no term is tracked.
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> RangeIndex {
        let mut index = RangeIndex::new();
        for (age, key) in [(20, "a"), (25, "b"), (30, "c"), (35, "d")] {
            index.insert(Term::Num(age as f64), key.into());
        }
        index
    }

    #[test]
    fn gte_returns_ascending_matches() {
        let index = populated();
        let mut keys = index.query(Operator::Gte, &Term::Num(25.0));
        keys.sort();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string(), "d".to_string()]);
    }

    #[test]
    fn lt_excludes_boundary() {
        let index = populated();
        let mut keys = index.query(Operator::Lt, &Term::Num(30.0));
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_drops_term_once_bucket_empties() {
        let mut index = populated();
        index.remove(&Term::Num(20.0), "a");
        assert_eq!(index.query(Operator::Gte, &Term::Num(0.0)).len(), 3);
    }

    #[test]
    fn accepts_rejects_mismatched_type_after_first_insert() {
        let index = populated();
        assert!(!index.accepts(&Term::Str("x".into())));
        assert!(index.accepts(&Term::Num(99.0)));
    }

    #[test]
    fn duplicate_values_share_one_sorted_slot() {
        let mut index = RangeIndex::new();
        index.insert(Term::Num(10.0), "a".into());
        index.insert(Term::Num(10.0), "b".into());
        let mut keys = index.query(Operator::Gte, &Term::Num(10.0));
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
