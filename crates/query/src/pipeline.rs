//! In-memory result pipeline: `sort`, `limit`, `skip`, `first`, `last`,
//! `filter`, `map` over a matched set (§4.4). Not lazy beyond the initial
//! match; tuned for working sets up to ~10^5 entries.

use emberstore_core::{get_at_path, Path, Value};
use std::cmp::Ordering;
use std::str::FromStr;

/// Sort direction for [`ResultPipeline::sort_by_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// An ordered, owned sequence of `(key, value)` matches.
#[derive(Debug, Clone)]
pub struct ResultPipeline {
    items: Vec<(String, Value)>,
}

impl ResultPipeline {
    /// Wrap an already-matched set of `(key, value)` pairs.
    pub fn new(items: Vec<(String, Value)>) -> Self {
        ResultPipeline { items }
    }

    /// Stable sort by the value projected at `field`. Documents missing the
    /// field (or projecting to something non-comparable) sort after those
    /// that have it, regardless of direction.
    pub fn sort_by_field(mut self, field: &str, direction: SortDirection) -> Self {
        let path = Path::from_str(field).unwrap_or_default();
        self.items.sort_by(|(_, a), (_, b)| {
            let ord = compare_projected(get_at_path(a, &path), get_at_path(b, &path));
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        self
    }

    /// Stable sort by a caller-supplied comparator over `(key, value)`.
    pub fn sort_by(mut self, mut cmp: impl FnMut(&(String, Value), &(String, Value)) -> Ordering) -> Self {
        self.items.sort_by(|a, b| cmp(a, b));
        self
    }

    /// Keep at most the first `n` items.
    pub fn limit(mut self, n: usize) -> Self {
        self.items.truncate(n);
        self
    }

    /// Drop the first `n` items.
    pub fn skip(mut self, n: usize) -> Self {
        let n = n.min(self.items.len());
        self.items.drain(..n);
        self
    }

    /// Keep only items matching `predicate`.
    pub fn filter(mut self, predicate: impl Fn(&str, &Value) -> bool) -> Self {
        self.items.retain(|(k, v)| predicate(k, v));
        self
    }

    /// The first item, if any.
    pub fn first(&self) -> Option<&(String, Value)> {
        self.items.first()
    }

    /// The last item, if any.
    pub fn last(&self) -> Option<&(String, Value)> {
        self.items.last()
    }

    /// Transform every item into `T`, ending the pipeline.
    pub fn map<T>(&self, f: impl Fn(&str, &Value) -> T) -> Vec<T> {
        self.items.iter().map(|(k, v)| f(k, v)).collect()
    }

    /// The matched values, discarding keys.
    pub fn into_values(self) -> Vec<Value> {
        self.items.into_iter().map(|(_, v)| v).collect()
    }

    /// The matched `(key, value)` pairs.
    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.items
    }

    /// Borrow the matched `(key, value)` pairs without consuming the pipeline.
    pub fn as_pairs(&self) -> &[(String, Value)] {
        &self.items
    }

    /// Number of matched items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn compare_projected(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            if let (Some(xf), Some(yf)) = (x.as_f64(), y.as_f64()) {
                xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
            } else if let (Some(xs), Some(ys)) = (x.as_json().as_str(), y.as_json().as_str()) {
                xs.cmp(ys)
            } else {
                Ordering::Equal
            }
        }
    }
}
