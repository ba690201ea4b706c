//! Size limits for keys and values.
//!
//! Violations surface as [`crate::EmberError::ConstraintViolation`].
//!
//! ## Contract
//!
//! Defaults are conservative enough to protect an embedded process from an
//! accidental multi-gigabyte document; callers can relax them at open time
//! via [`Limits::custom`].

use crate::Value;
use thiserror::Error;

/// Size limits enforced on keys and values.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum key length in bytes.
    pub max_key_bytes: usize,
    /// Maximum string length in bytes.
    pub max_string_bytes: usize,
    /// Maximum array length in elements.
    pub max_array_len: usize,
    /// Maximum object entry count.
    pub max_object_entries: usize,
    /// Maximum nesting depth.
    pub max_nesting_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_bytes: 1024,
            max_string_bytes: 16 * 1024 * 1024,
            max_array_len: 1_000_000,
            max_object_entries: 1_000_000,
            max_nesting_depth: 128,
        }
    }
}

impl Limits {
    /// Construct limits with explicit values, for hosts that want to relax
    /// or tighten the defaults.
    pub fn custom(
        max_key_bytes: usize,
        max_string_bytes: usize,
        max_array_len: usize,
        max_object_entries: usize,
        max_nesting_depth: usize,
    ) -> Self {
        Limits {
            max_key_bytes,
            max_string_bytes,
            max_array_len,
            max_object_entries,
            max_nesting_depth,
        }
    }

    /// Small limits for exercising limit-violation paths in tests without
    /// constructing multi-megabyte fixtures.
    pub fn with_small_limits() -> Self {
        Limits {
            max_key_bytes: 64,
            max_string_bytes: 256,
            max_array_len: 16,
            max_object_entries: 16,
            max_nesting_depth: 4,
        }
    }

    /// Validate a key's length.
    pub fn validate_key(&self, key: &str) -> Result<(), LimitError> {
        if key.len() > self.max_key_bytes {
            return Err(LimitError::KeyTooLong {
                actual: key.len(),
                max: self.max_key_bytes,
            });
        }
        Ok(())
    }

    /// Validate a value against string/array/object/nesting limits.
    pub fn validate_value(&self, value: &Value) -> Result<(), LimitError> {
        self.validate_json(value.as_json(), 0)
    }

    fn validate_json(&self, value: &serde_json::Value, depth: usize) -> Result<(), LimitError> {
        if depth > self.max_nesting_depth {
            return Err(LimitError::NestingTooDeep {
                actual: depth,
                max: self.max_nesting_depth,
            });
        }
        match value {
            serde_json::Value::String(s) if s.len() > self.max_string_bytes => {
                Err(LimitError::ValueTooLarge {
                    reason: "string_too_long",
                    actual: s.len(),
                    max: self.max_string_bytes,
                })
            }
            serde_json::Value::Array(items) => {
                if items.len() > self.max_array_len {
                    return Err(LimitError::ValueTooLarge {
                        reason: "array_too_long",
                        actual: items.len(),
                        max: self.max_array_len,
                    });
                }
                items.iter().try_for_each(|v| self.validate_json(v, depth + 1))
            }
            serde_json::Value::Object(map) => {
                if map.len() > self.max_object_entries {
                    return Err(LimitError::ValueTooLarge {
                        reason: "object_too_many_entries",
                        actual: map.len(),
                        max: self.max_object_entries,
                    });
                }
                map.values().try_for_each(|v| self.validate_json(v, depth + 1))
            }
            _ => Ok(()),
        }
    }
}

/// Limit validation errors; these map onto `ConstraintViolation`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// Key exceeds the maximum length.
    #[error("key too long: {actual} bytes exceeds maximum {max}")]
    KeyTooLong {
        /// Actual key length.
        actual: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// A string, array, or object within the value exceeds its limit.
    #[error("value too large ({reason}): {actual} exceeds maximum {max}")]
    ValueTooLarge {
        /// Which limit was violated.
        reason: &'static str,
        /// Actual size observed.
        actual: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Value nesting exceeds the maximum depth.
    #[error("nesting too deep: {actual} levels exceeds maximum {max}")]
    NestingTooDeep {
        /// Actual nesting depth.
        actual: usize,
        /// Maximum allowed depth.
        max: usize,
    },
}
