//! Error types shared across the storage engine.
//!
//! `EmberError` is the unified error type returned by the public store,
//! query, collection, and replication surfaces. Each category carries enough
//! structured context to render a useful message without string-matching,
//! and a set of classification predicates let callers decide how to react
//! (retry, surface to a user, log and move on) without matching on variants
//! directly.

use std::io;
use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EmberError>;

/// Unified error type for the storage engine.
#[derive(Debug, Error)]
pub enum EmberError {
    /// Operation attempted before the engine finished `init`.
    #[error("store not ready: {0}")]
    NotReady(String),

    /// A WAL append failed; the in-memory state was not updated.
    #[error("durability failure: {message}")]
    Durability {
        /// What was being persisted when the failure occurred.
        message: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// Snapshot or WAL could not be parsed and no backup recovery succeeded.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Schema or collection rule failed; no state was changed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Replica rejected a local write, or a collection op referenced a
    /// missing document, or a constraint on an existing key was violated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// `get`/`delete` target does not exist. Not used for `get` (which
    /// returns `Option`) — reserved for APIs that must fail on a miss.
    #[error("not found: {0}")]
    NotFound(String),

    /// Requested operator is not supported by the index kind; caller should
    /// treat this as a hint, not a hard failure (query degrades to scan).
    #[error("index does not support operator: {0}")]
    IndexUnsupported(String),

    /// A follower was unreachable during broadcast. Recorded in the health
    /// table; never propagated to the write caller that triggered it.
    #[error("replication failure: {0}")]
    ReplicationFailure(String),

    /// An incoming replicated op conflicted with a newer local write and was
    /// resolved via last-writer-wins. Not a call-level failure.
    #[error("conflict resolved on key {key}: {strategy}")]
    ConflictResolved {
        /// The key the conflict was detected on.
        key: String,
        /// Resolution strategy applied (e.g. `lww_remote`, `on_conflict`).
        strategy: String,
    },
}

impl EmberError {
    /// Build a [`EmberError::NotReady`].
    pub fn not_ready(message: impl Into<String>) -> Self {
        EmberError::NotReady(message.into())
    }

    /// Build a [`EmberError::Durability`] with no underlying I/O source.
    pub fn durability(message: impl Into<String>) -> Self {
        EmberError::Durability {
            message: message.into(),
            source: None,
        }
    }

    /// Build a [`EmberError::Durability`] wrapping an I/O error.
    pub fn durability_with_source(message: impl Into<String>, source: io::Error) -> Self {
        EmberError::Durability {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Build a [`EmberError::Corruption`].
    pub fn corruption(message: impl Into<String>) -> Self {
        EmberError::Corruption(message.into())
    }

    /// Build a [`EmberError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        EmberError::Validation(message.into())
    }

    /// Build a [`EmberError::ConstraintViolation`].
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        EmberError::ConstraintViolation(message.into())
    }

    /// Build a [`EmberError::NotFound`].
    pub fn not_found(key: impl Into<String>) -> Self {
        EmberError::NotFound(key.into())
    }

    /// Build a [`EmberError::IndexUnsupported`].
    pub fn index_unsupported(message: impl Into<String>) -> Self {
        EmberError::IndexUnsupported(message.into())
    }

    /// Build a [`EmberError::ReplicationFailure`].
    pub fn replication_failure(message: impl Into<String>) -> Self {
        EmberError::ReplicationFailure(message.into())
    }

    /// Build a [`EmberError::ConflictResolved`].
    pub fn conflict_resolved(key: impl Into<String>, strategy: impl Into<String>) -> Self {
        EmberError::ConflictResolved {
            key: key.into(),
            strategy: strategy.into(),
        }
    }

    /// True for errors that are safe for a caller to retry verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmberError::Durability { .. } | EmberError::NotReady(_))
    }

    /// True for errors that indicate the store degraded (data loss risk)
    /// rather than a single operation being rejected.
    pub fn is_serious(&self) -> bool {
        matches!(self, EmberError::Corruption(_) | EmberError::Durability { .. })
    }

    /// True for the two non-error-propagating conflict/replication cases —
    /// code that logs-and-continues can use this to filter them out of a
    /// "real" error path.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EmberError::ConflictResolved { .. } | EmberError::ReplicationFailure(_)
        )
    }

    /// True for validation/constraint errors raised before any write took
    /// effect.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            EmberError::Validation(_) | EmberError::ConstraintViolation(_)
        )
    }
}

impl From<io::Error> for EmberError {
    fn from(e: io::Error) -> Self {
        EmberError::durability_with_source("I/O error", e)
    }
}

impl From<serde_json::Error> for EmberError {
    fn from(e: serde_json::Error) -> Self {
        EmberError::Corruption(format!("malformed JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durability_display_includes_message() {
        let err = EmberError::durability("wal append failed");
        assert!(err.to_string().contains("wal append failed"));
        assert!(err.is_retryable());
    }

    #[test]
    fn corruption_is_serious_not_retryable() {
        let err = EmberError::corruption("snapshot truncated");
        assert!(err.is_serious());
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflict_resolved_is_conflict_not_validation() {
        let err = EmberError::conflict_resolved("user::1", "lww_remote");
        assert!(err.is_conflict());
        assert!(!err.is_validation_error());
        assert!(err.to_string().contains("user::1"));
    }

    #[test]
    fn validation_and_constraint_are_validation_errors() {
        assert!(EmberError::validation("bad field").is_validation_error());
        assert!(EmberError::constraint_violation("missing doc").is_validation_error());
    }

    #[test]
    fn io_error_converts_to_durability() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: EmberError = io_err.into();
        assert!(matches!(err, EmberError::Durability { .. }));
    }

    #[test]
    fn json_error_converts_to_corruption() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: EmberError = json_err.into();
        assert!(matches!(err, EmberError::Corruption(_)));
    }
}
