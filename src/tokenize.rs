//! Word tokenizer shared by corpus and query vectorization.
//!
//! Lower-cases the input and extracts maximal runs of word characters
//! (letters, digits, underscore); everything else is a separator.
//! No stemming, no stop-word removal; the matcher depends on the
//! query and the corpus being tokenized identically.

/// Split text into normalized word tokens. Pure and deterministic.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
