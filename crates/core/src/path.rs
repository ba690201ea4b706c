//! Dot-path projection into [`Value`] trees (§4.4).
//!
//! `field` accepts dotted names; each segment looks up either an object
//! property or an array index (purely numeric segments). This is used by
//! the index manager to project an indexed field out of a stored value, by
//! the query engine's `where`, and by collection `$set` updates.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a dotted path string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Two dots in a row, or a path starting/ending with a dot.
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),
    /// `[` without a matching `]`.
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// `[...]` did not contain a valid non-negative integer.
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
}

/// One segment of a [`Path`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object property access.
    Key(String),
    /// Array index access.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{k}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A dot-separated path into a [`Value`] tree, e.g. `user.addresses[0].city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The root path (selects the whole document).
    pub fn root() -> Self {
        Path { segments: Vec::new() }
    }

    /// True if this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Borrow the path's segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Append a key segment (builder style).
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder style).
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    /// Parse `user.addresses[0].city` into segments. A purely numeric
    /// bracketed segment is an array index; everything else (including a
    /// numeric dotted segment, which spec §4.4 treats as an object key
    /// unless bracketed) is an object key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Path::root());
        }

        let mut segments = Vec::new();
        let mut key_buf = String::new();
        let chars: Vec<char> = s.chars().collect();
        let mut i = 0;
        let flush_key = |buf: &mut String, segments: &mut Vec<PathSegment>, pos: usize| -> Result<(), PathParseError> {
            if buf.is_empty() {
                return Err(PathParseError::EmptyKey(pos));
            }
            segments.push(PathSegment::Key(std::mem::take(buf)));
            Ok(())
        };

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    flush_key(&mut key_buf, &mut segments, i)?;
                    i += 1;
                }
                '[' => {
                    if !key_buf.is_empty() {
                        flush_key(&mut key_buf, &mut segments, i)?;
                    }
                    let start = i;
                    i += 1;
                    let idx_start = i;
                    while i < chars.len() && chars[i] != ']' {
                        i += 1;
                    }
                    if i >= chars.len() {
                        return Err(PathParseError::UnclosedBracket(start));
                    }
                    let idx_str: String = chars[idx_start..i].iter().collect();
                    let idx = idx_str
                        .parse::<usize>()
                        .map_err(|_| PathParseError::InvalidIndex(idx_start, idx_str))?;
                    segments.push(PathSegment::Index(idx));
                    i += 1; // consume ']'
                }
                c => {
                    key_buf.push(c);
                    i += 1;
                }
            }
        }
        if !key_buf.is_empty() {
            flush_key(&mut key_buf, &mut segments, chars.len())?;
        } else if matches!(segments.last(), None) {
            return Err(PathParseError::EmptyKey(0));
        }

        Ok(Path { segments })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{k}")?;
                }
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

/// Project `value` at `path`, returning `None` if any segment is undefined
/// or type-incompatible (object key on a non-object, index on a non-array
/// or out of bounds).
pub fn get_at_path<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current: &serde_json::Value = value.as_json();
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), serde_json::Value::Object(obj)) => obj.get(key)?,
            (PathSegment::Index(idx), serde_json::Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    // `Value` is `#[repr(transparent)]` over `serde_json::Value`.
    Some(unsafe { &*(current as *const serde_json::Value as *const Value) })
}

/// Set `value` at `path` within `root`, creating intermediate objects as
/// needed (intermediate arrays are never auto-created; an index path into a
/// missing array is a type error). Setting at the root path replaces the
/// whole document.
pub fn set_at_path(root: &mut Value, path: &Path, value: Value) -> Result<(), PathSetError> {
    if path.is_root() {
        *root = value;
        return Ok(());
    }
    let segments = path.segments();
    let (parents, last) = segments.split_at(segments.len() - 1);
    let last = &last[0];

    let mut current = root.as_json_mut();
    for segment in parents {
        match segment {
            PathSegment::Key(key) => {
                if !current.is_object() {
                    if current.is_null() {
                        *current = serde_json::Value::Object(serde_json::Map::new());
                    } else {
                        return Err(PathSetError::TypeMismatch);
                    }
                }
                let obj = current.as_object_mut().unwrap();
                current = obj
                    .entry(key.clone())
                    .or_insert(serde_json::Value::Object(serde_json::Map::new()));
            }
            PathSegment::Index(idx) => {
                if !current.is_array() {
                    return Err(PathSetError::TypeMismatch);
                }
                let arr = current.as_array_mut().unwrap();
                current = arr.get_mut(*idx).ok_or(PathSetError::IndexOutOfBounds)?;
            }
        }
    }

    match last {
        PathSegment::Key(key) => {
            if !current.is_object() {
                *current = serde_json::Value::Object(serde_json::Map::new());
            }
            current
                .as_object_mut()
                .unwrap()
                .insert(key.clone(), value.into_json());
        }
        PathSegment::Index(idx) => {
            if !current.is_array() {
                return Err(PathSetError::TypeMismatch);
            }
            let arr = current.as_array_mut().unwrap();
            if *idx < arr.len() {
                arr[*idx] = value.into_json();
            } else if *idx == arr.len() {
                arr.push(value.into_json());
            } else {
                return Err(PathSetError::IndexOutOfBounds);
            }
        }
    }
    Ok(())
}

/// Delete the value at `path`, returning the removed value if it existed.
pub fn delete_at_path(root: &mut Value, path: &Path) -> Option<Value> {
    if path.is_root() {
        return Some(std::mem::replace(root, Value::null()));
    }
    let segments = path.segments();
    let (parents, last) = segments.split_at(segments.len() - 1);
    let last = &last[0];

    let mut current = root.as_json_mut();
    for segment in parents {
        current = match segment {
            PathSegment::Key(key) => current.as_object_mut()?.get_mut(key)?,
            PathSegment::Index(idx) => current.as_array_mut()?.get_mut(*idx)?,
        };
    }

    match last {
        PathSegment::Key(key) => current.as_object_mut()?.remove(key).map(Value::from_json),
        PathSegment::Index(idx) => {
            let arr = current.as_array_mut()?;
            if *idx < arr.len() {
                Some(Value::from_json(arr.remove(*idx)))
            } else {
                None
            }
        }
    }
}

/// RFC 7396 JSON Merge Patch, used for `update(query, patch)` without `$set`
/// (whole-document merge per §4.5).
pub fn merge_patch(target: &mut Value, patch: &Value) {
    merge_inner(target.as_json_mut(), patch.as_json());
}

fn merge_inner(target: &mut serde_json::Value, patch: &serde_json::Value) {
    if let serde_json::Value::Object(patch_obj) = patch {
        if !target.is_object() {
            *target = serde_json::Value::Object(serde_json::Map::new());
        }
        let target_obj = target.as_object_mut().unwrap();
        for (key, value) in patch_obj {
            if value.is_null() {
                target_obj.remove(key);
            } else if let Some(existing) = target_obj.get_mut(key) {
                merge_inner(existing, value);
            } else {
                target_obj.insert(key.clone(), value.clone());
            }
        }
    } else {
        *target = patch.clone();
    }
}

/// Error mutating a [`Value`] through a [`Path`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathSetError {
    /// A segment expected an object or array but found something else.
    #[error("path segment type mismatch")]
    TypeMismatch,
    /// An array index segment was beyond `len` (only `len` itself, i.e.
    /// append, is permitted beyond the current bound).
    #[error("array index out of bounds")]
    IndexOutOfBounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_and_bracketed_segments() {
        let path: Path = "user.addresses[0].city".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("user".into()),
                PathSegment::Key("addresses".into()),
                PathSegment::Index(0),
                PathSegment::Key("city".into()),
            ]
        );
    }

    #[test]
    fn get_at_path_navigates_nested_document() {
        let doc = Value::from_json(serde_json::json!({"user": {"addresses": [{"city": "NYC"}]}}));
        let path: Path = "user.addresses[0].city".parse().unwrap();
        assert_eq!(get_at_path(&doc, &path).unwrap().as_json().as_str(), Some("NYC"));
    }

    #[test]
    fn get_at_path_missing_segment_is_none() {
        let doc = Value::from_json(serde_json::json!({"user": {"name": "Al"}}));
        let path: Path = "user.age".parse().unwrap();
        assert!(get_at_path(&doc, &path).is_none());
    }

    #[test]
    fn set_at_path_creates_intermediate_objects() {
        let mut doc = Value::object();
        let path: Path = "user.profile.name".parse().unwrap();
        set_at_path(&mut doc, &path, Value::from("Alice")).unwrap();
        assert_eq!(get_at_path(&doc, &path).unwrap().as_json(), "Alice");
    }

    #[test]
    fn delete_at_path_removes_object_key() {
        let mut doc = Value::from_json(serde_json::json!({"name": "Alice", "age": 30}));
        let path: Path = "name".parse().unwrap();
        let removed = delete_at_path(&mut doc, &path).unwrap();
        assert_eq!(removed.as_json().as_str(), Some("Alice"));
        assert!(get_at_path(&doc, &path).is_none());
    }

    #[test]
    fn merge_patch_removes_null_keys_and_merges_nested() {
        let mut target = Value::from_json(serde_json::json!({"a": 1, "b": {"x": 1}}));
        let patch = Value::from_json(serde_json::json!({"a": null, "b": {"y": 2}}));
        merge_patch(&mut target, &patch);
        assert_eq!(
            target.as_json(),
            &serde_json::json!({"b": {"x": 1, "y": 2}})
        );
    }
}
