//! Bounded cache of compiled `where` clauses, keyed by `field|op|value`
//! (§4.4: "avoids recompilation; cache size capped to prevent unbounded
//! growth").

use crate::predicate::WhereClause;
use emberstore_core::{Result, Value};
use emberstore_index::Operator;
use std::collections::{HashMap, VecDeque};

/// FIFO-evicted cache of compiled [`WhereClause`]s.
pub struct PredicateCache {
    capacity: usize,
    entries: HashMap<String, WhereClause>,
    order: VecDeque<String>,
}

impl PredicateCache {
    /// A cache holding at most `capacity` compiled clauses.
    pub fn new(capacity: usize) -> Self {
        PredicateCache { capacity, entries: HashMap::new(), order: VecDeque::new() }
    }

    /// Return the cached clause for `field|op|value`, compiling and
    /// inserting it (evicting the oldest entry if full) on a miss.
    pub fn get_or_compile(&mut self, field: &str, op: Operator, value: &Value) -> Result<WhereClause> {
        let key = cache_key(field, op, value);
        if let Some(clause) = self.entries.get(&key) {
            return Ok(clause.clone());
        }
        let clause = WhereClause::compile(field, op, value.clone())?;
        if self.capacity > 0 {
            if self.entries.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.order.push_back(key.clone());
            self.entries.insert(key, clause.clone());
        }
        Ok(clause)
    }

    /// Number of compiled clauses currently cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cache_key(field: &str, op: Operator, value: &Value) -> String {
    format!("{field}|{op:?}|{}", value.as_json())
}
