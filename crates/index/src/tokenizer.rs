//! Splits a string into lowercase tokens on non-alphanumeric boundaries, for
//! the text index (§4.3).

/// Lowercase and split `text` on runs of non-alphanumeric characters.
///
/// # Example
///
/// ```
/// use emberstore_index::tokenizer::tokenize;
///
/// assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
