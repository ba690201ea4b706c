//! Index kinds, the operators each one supports, and the scalar term type
//! indexes key their buckets by.

use emberstore_core::Value;

/// The kind of secondary index maintained on a field (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKind {
    /// Exact-match lookup.
    Hash,
    /// Ordered comparisons on numbers or strings.
    Range,
    /// Tokenised substring/prefix/suffix lookup on strings.
    Text,
}

/// A comparison or membership operator accepted by `where`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`. Not served by any index (a negated equality rarely narrows a
    /// bucket); always falls back to scan.
    Ne,
    /// Set membership against an array of candidate values.
    In,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// Substring membership.
    Contains,
    /// Token prefix match.
    StartsWith,
    /// Token suffix match.
    EndsWith,
}

impl IndexKind {
    /// True if this index kind can serve `op` directly.
    pub fn supports(&self, op: Operator) -> bool {
        match self {
            IndexKind::Hash => matches!(op, Operator::Eq | Operator::In),
            IndexKind::Range => matches!(op, Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte),
            IndexKind::Text => matches!(op, Operator::Contains | Operator::StartsWith | Operator::EndsWith),
        }
    }
}

/// A scalar projected out of an indexed field, used as a bucket key.
///
/// Objects, arrays, and `null` are not indexable and project to `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A string scalar.
    Str(String),
    /// A numeric scalar.
    Num(f64),
    /// A boolean scalar.
    Bool(bool),
}

impl Eq for Term {}

impl std::hash::Hash for Term {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Term::Str(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Term::Num(n) => {
                1u8.hash(state);
                n.to_bits().hash(state);
            }
            Term::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
        }
    }
}

impl Term {
    /// Project a scalar term out of `value`, or `None` if it's not a
    /// hashable scalar (object, array, or null).
    pub fn from_value(value: &Value) -> Option<Term> {
        match value.as_json() {
            serde_json::Value::String(s) => Some(Term::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(Term::Num),
            serde_json::Value::Bool(b) => Some(Term::Bool(*b)),
            _ => None,
        }
    }

    /// Ordering used by the range index. Only meaningful between terms of
    /// the same variant; comparing across variants returns `Equal` so
    /// callers relying on same-type buckets never observe it.
    pub fn cmp_ordered(&self, other: &Term) -> std::cmp::Ordering {
        match (self, other) {
            (Term::Str(a), Term::Str(b)) => a.cmp(b),
            (Term::Num(a), Term::Num(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
            (Term::Bool(a), Term::Bool(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }

    /// True if `self` and `other` are the same variant (range indexes only
    /// ever compare within one type, per B3).
    pub fn same_kind(&self, other: &Term) -> bool {
        matches!(
            (self, other),
            (Term::Str(_), Term::Str(_)) | (Term::Num(_), Term::Num(_)) | (Term::Bool(_), Term::Bool(_))
        )
    }

    /// The string form, for the text index's tokeniser; `None` for
    /// non-string terms (text indexes only accept strings).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Term::Str(s) => Some(s),
            _ => None,
        }
    }
}
