//! Namespaced document collections over the key/value store: Mongo-style
//! query matching and per-field schema validation (§4.5).

pub mod collection;
pub mod query;
pub mod schema;

pub use collection::Collection;
pub use schema::{FieldRule, FieldType, Schema};
