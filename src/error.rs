//! Error handling types and utilities.

use thiserror::Error;

/// A specialized Result type for application-level plumbing (config, server).
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods. Library operations return the typed errors below.
pub type Result<T> = anyhow::Result<T>;

/// A description shard was rejected because its payload is malformed.
///
/// Only the offending shard is rejected; everything registered before stays intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A parallel column does not have as many rows as `names`.
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },
    /// A record carries a kind code outside the known item types.
    #[error("record {record} has unknown kind code {code}")]
    UnknownKind { record: usize, code: u8 },
    /// A record points past the end of the decoded string table.
    #[error("record {record}: '{column}' index {index} is outside the string table ({len} strings)")]
    StringIndexOutOfRange {
        record: usize,
        column: &'static str,
        index: u32,
        len: usize,
    },
    /// A string-table backreference points before the start of the table.
    #[error("string slot {slot} refers {back} slots back")]
    BadBackReference { slot: usize, back: u32 },
    /// A parent index is out of range or refers to the record itself.
    #[error("record {record} has invalid parent {parent}")]
    ParentOutOfRange { record: usize, parent: u32 },
    /// A signature column entry is not valid type syntax.
    #[error("record {record} has a malformed signature: {source}")]
    MalformedSignature {
        record: usize,
        #[source]
        source: ParseError,
    },
}

/// Malformed query or type syntax, with the byte offset where parsing failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }

    /// Shift the position by `offset`, for errors raised on a sub-slice.
    pub(crate) fn offset(mut self, offset: usize) -> Self {
        self.position += offset;
        self
    }
}

/// Why a single implementor record was dropped. Never fails a whole registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("unrecognized record: {0}")]
    Unrecognized(String),
    #[error("impl header has no `for` clause: {0}")]
    MissingFor(String),
    #[error("unbalanced generics in impl header: {0}")]
    Unbalanced(String),
    #[error("implementing type does not parse: {0}")]
    Shape(#[from] ParseError),
}

/// Returned by a second `attach`: only one implementor consumer may exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("an implementor consumer is already attached")]
pub struct AlreadyAttachedError;
