//! Query parsing: kind filters and the name / path / type modes.

use crate::error::ParseError;
use crate::shape::parse_signature;
use crate::types::{ItemKind, Signature};

/// A parsed search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Only symbols of this kind are returned.
    pub kind: Option<ItemKind>,
    pub mode: QueryMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    /// Nothing to search for; evaluates to no results.
    Empty,
    /// Lowercased bare name, e.g. `iterator`.
    Name(String),
    /// Lowercased `::`-separated segments. `children` is set by a trailing `::`.
    Path { segments: Vec<String>, children: bool },
    /// Parameter and return shapes, e.g. `Vec<T>, usize -> Option<T>`.
    Type(Signature),
}

impl Query {
    pub fn is_empty(&self) -> bool {
        matches!(self.mode, QueryMode::Empty)
    }
}

/// Parse a raw query string. Positions in errors are byte offsets into `raw`.
pub fn parse(raw: &str) -> Result<Query, ParseError> {
    let (mut offset, mut rest) = trim_with_offset(raw, 0);
    let mut kind = None;

    if let Some((filter, after)) = split_filter(rest) {
        kind = Some(
            ItemKind::from_filter(&filter.to_ascii_lowercase())
                .ok_or_else(|| ParseError::new(offset, format!("unknown kind filter `{filter}`")))?,
        );
        (offset, rest) = trim_with_offset(after, offset + filter.len() + 1);
    }

    let mode = if rest.is_empty() {
        QueryMode::Empty
    } else if looks_like_type_query(rest) {
        let signature = parse_signature(rest).map_err(|e| e.offset(offset))?;
        if signature.params.is_empty() && signature.ret.is_none() {
            return Err(ParseError::new(offset, "expected a parameter or return type"));
        }
        QueryMode::Type(signature)
    } else if rest.contains("::") {
        parse_path(rest, offset)?
    } else {
        QueryMode::Name(rest.to_lowercase())
    };

    Ok(Query { kind, mode })
}

/// Whether `text` reads as type syntax rather than a name or path.
pub fn looks_like_type_query(text: &str) -> bool {
    text.contains("->") || text.contains(',') || text.contains('<')
}

/// `fn:parse` → `("fn", "parse")`. A `::` is a path separator, not a filter.
fn split_filter(text: &str) -> Option<(&str, &str)> {
    let colon = text.find(':')?;
    let (filter, after) = (&text[..colon], &text[colon + 1..]);
    if filter.is_empty() || after.starts_with(':') {
        return None;
    }
    filter
        .chars()
        .all(|c| c.is_ascii_alphabetic())
        .then_some((filter, after))
}

fn trim_with_offset(text: &str, base: usize) -> (usize, &str) {
    let start = text.len() - text.trim_start().len();
    (base + start, text.trim())
}

fn parse_path(text: &str, offset: usize) -> Result<QueryMode, ParseError> {
    let (text, children) = match text.strip_suffix("::") {
        Some(stripped) => (stripped, true),
        None => (text, false),
    };

    let mut segments = Vec::new();
    let mut position = offset;
    for segment in text.split("::") {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            return Err(ParseError::new(position, "empty path segment"));
        }
        segments.push(trimmed.to_lowercase());
        position += segment.len() + 2;
    }

    Ok(QueryMode::Path { segments, children })
}
