//! Query engine: ties a persistent predicate cache to index-or-scan
//! dispatch (§4.4). Holds no reference to the store or index manager
//! between calls, so the engine crate can own the write lock while this
//! crate stays free of concurrency concerns.

use crate::cache::PredicateCache;
use crate::pipeline::ResultPipeline;
use emberstore_core::{Result, Value};
use emberstore_index::{IndexManager, Operator};

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Compiles and runs `find`/`where` queries against a caller-supplied
/// document snapshot and index manager.
pub struct QueryEngine {
    predicates: PredicateCache,
}

impl Default for QueryEngine {
    fn default() -> Self {
        QueryEngine { predicates: PredicateCache::new(DEFAULT_CACHE_CAPACITY) }
    }
}

impl QueryEngine {
    /// A query engine with the default predicate cache size.
    pub fn new() -> Self {
        Self::default()
    }

    /// A query engine whose predicate cache holds at most `capacity`
    /// compiled clauses.
    pub fn with_cache_capacity(capacity: usize) -> Self {
        QueryEngine { predicates: PredicateCache::new(capacity) }
    }

    /// Full scan of `entries`, keeping those matching `predicate`.
    pub fn find(&self, entries: &[(String, Value)], predicate: impl Fn(&str, &Value) -> bool) -> ResultPipeline {
        let matched: Vec<(String, Value)> = entries.iter().filter(|(k, v)| predicate(k, v)).cloned().collect();
        ResultPipeline::new(matched)
    }

    /// Evaluate `field op value` against `entries`. Tries `indexes` first;
    /// on a miss (no covering index, or the operator only scan supports)
    /// falls back to a full scan using the compiled clause.
    pub fn where_clause(
        &mut self,
        entries: &[(String, Value)],
        indexes: &IndexManager,
        field: &str,
        op: Operator,
        value: &Value,
    ) -> Result<ResultPipeline> {
        let clause = self.predicates.get_or_compile(field, op, value)?;

        if let Some(keys) = indexes.query(field, op, value) {
            let lookup: std::collections::HashMap<&str, &Value> =
                entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
            let matched: Vec<(String, Value)> = keys
                .into_iter()
                .filter_map(|key| lookup.get(key.as_str()).map(|v| (key, (*v).clone())))
                .collect();
            return Ok(ResultPipeline::new(matched));
        }

        tracing::debug!(field, ?op, "falling back to full scan for query");
        let matched: Vec<(String, Value)> =
            entries.iter().filter(|(_, v)| clause.matches(v)).cloned().collect();
        Ok(ResultPipeline::new(matched))
    }

    /// Number of documents in `entries` (no predicate).
    pub fn count(&self, entries: &[(String, Value)]) -> usize {
        entries.len()
    }
}
