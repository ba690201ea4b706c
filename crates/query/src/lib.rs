//! Query layer: compiled `where` predicates, a result pipeline (sort,
//! limit, skip, filter), aggregations, and an engine dispatching between
//! secondary indexes and full scans (§4.4).

pub mod aggregate;
pub mod cache;
pub mod engine;
pub mod pipeline;
pub mod predicate;

pub use cache::PredicateCache;
pub use engine::QueryEngine;
pub use pipeline::{ResultPipeline, SortDirection};
pub use predicate::WhereClause;
