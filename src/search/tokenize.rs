//! Text tokenization and stemming for doc-term overlap.

use ahash::AHasher;
use rust_stemmers::Stemmer;
use std::hash::{Hash, Hasher};

/// Common English stop words, filtered out before stemming.
pub(crate) const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with",
];

/// Term hash for fast lookup
pub(crate) type TermHash = u64;

/// Stemmed, lowercase terms of `text`.
///
/// Words are runs of alphanumerics, `_` and `-`. A compound word yields its parts
/// and itself: "HttpServer" → ["http", "server", "httpserver"], "parse_json" →
/// ["pars", "json", "parse_json"].
pub(crate) fn tokenize_and_stem(text: &str, stemmer: &Stemmer) -> Vec<String> {
    let mut tokens = Vec::new();
    let words = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .filter(|word| !word.is_empty());

    for word in words {
        let parts = subwords(word);
        if parts.len() > 1 {
            for part in parts {
                index_token(part, &mut tokens, stemmer);
            }
        }
        index_token(word, &mut tokens, stemmer);
    }
    tokens
}

/// Split on `_`, `-` and lowercase-to-uppercase transitions.
fn subwords(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut after_lowercase = false;

    for (i, c) in word.char_indices() {
        if c == '_' || c == '-' {
            if i > start {
                parts.push(&word[start..i]);
            }
            start = i + c.len_utf8();
            after_lowercase = false;
            continue;
        }
        if after_lowercase && c.is_uppercase() && i > start {
            parts.push(&word[start..i]);
            start = i;
        }
        after_lowercase = c.is_lowercase();
    }

    if start < word.len() {
        parts.push(&word[start..]);
    }
    parts
}

/// Add a stemmed token unless it is a stop word.
fn index_token(token: &str, tokens: &mut Vec<String>, stemmer: &Stemmer) {
    let lowercase = token.to_lowercase();
    if STOP_WORDS.contains(&lowercase.as_str()) {
        return;
    }
    tokens.push(stemmer.stem(&lowercase).into_owned());
}

/// Hashes a term for fast lookup (case-insensitive).
pub(crate) fn hash_term(term: &str) -> TermHash {
    let mut hasher = AHasher::default();
    term.to_lowercase().hash(&mut hasher);
    hasher.finish()
}

/// Sorted, deduplicated term hashes of `text`.
pub(crate) fn term_set(text: &str, stemmer: &Stemmer) -> Vec<TermHash> {
    let mut terms: Vec<TermHash> = tokenize_and_stem(text, stemmer)
        .iter()
        .map(|token| hash_term(token))
        .collect();
    terms.sort_unstable();
    terms.dedup();
    terms
}
