//! Wire format of a description shard, plus a builder that produces it.

use crate::types::ItemKind;
use ahash::AHashMap;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// How far back the builder looks for a string to extend.
const BACKREF_WINDOW: usize = 16;

/// Shortest shared prefix worth encoding as a backreference.
const MIN_SHARED_PREFIX: usize = 4;

/// One slot of the raw string table.
///
/// - `"text"`: a literal
/// - `3`: repeat the string three slots back
/// - `[1, "::body"]`: the string one slot back, followed by `::body`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum RawString {
    Literal(String),
    Repeat(u32),
    Extend(u32, String),
}

/// A compact, column-oriented description shard.
///
/// All record columns are parallel to `names`; `signatures` may be omitted entirely.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
pub struct ShardPayload {
    /// Raw string table with backreferences.
    pub strings: Vec<RawString>,
    /// String index of each record's name.
    pub names: Vec<u32>,
    /// Item-type code of each record.
    pub kinds: Vec<u8>,
    /// String index of each record's `::`-joined module path.
    pub paths: Vec<u32>,
    /// String index of each record's doc summary.
    pub descs: Vec<u32>,
    /// Position of the enclosing record, if any.
    pub parents: Vec<Option<u32>>,
    /// String index of each record's `T1, T2 -> R` signature, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<Option<u32>>,
}

impl ShardPayload {
    /// Number of records, as declared by the `names` column.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Content hash used to detect identical re-registrations.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// One record handed to [`ShardBuilder::push`].
#[derive(Debug, Clone, Copy)]
pub struct RecordSpec<'a> {
    pub name: &'a str,
    pub kind: ItemKind,
    pub module_path: &'a str,
    pub doc: &'a str,
    pub parent: Option<u32>,
    pub signature: Option<&'a str>,
}

impl<'a> RecordSpec<'a> {
    pub const fn new(name: &'a str, kind: ItemKind, module_path: &'a str) -> Self {
        Self {
            name,
            kind,
            module_path,
            doc: "",
            parent: None,
            signature: None,
        }
    }

    #[must_use]
    pub const fn doc(mut self, doc: &'a str) -> Self {
        self.doc = doc;
        self
    }

    #[must_use]
    pub const fn parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub const fn signature(mut self, signature: &'a str) -> Self {
        self.signature = Some(signature);
        self
    }
}

/// Builds a [`ShardPayload`], deduplicating strings and emitting prefix backreferences.
///
/// Used by hosts that assemble shards in memory and by tests.
#[derive(Debug, Default)]
pub struct ShardBuilder {
    payload: ShardPayload,
    plain: Vec<String>,
    slots: AHashMap<String, u32>,
    any_signature: bool,
}

impl ShardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its position (the future symbol id).
    pub fn push(&mut self, record: RecordSpec<'_>) -> u32 {
        let position = self.payload.names.len() as u32;
        let name = self.intern(record.name);
        let path = self.intern(record.module_path);
        let desc = self.intern(record.doc);
        let signature = record.signature.map(|s| self.intern(s));

        self.payload.names.push(name);
        self.payload.kinds.push(record.kind.code());
        self.payload.paths.push(path);
        self.payload.descs.push(desc);
        self.payload.parents.push(record.parent);
        self.payload.signatures.push(signature);
        self.any_signature |= signature.is_some();
        position
    }

    pub fn build(mut self) -> ShardPayload {
        if !self.any_signature {
            self.payload.signatures.clear();
        }
        self.payload
    }

    fn intern(&mut self, text: &str) -> u32 {
        if let Some(&slot) = self.slots.get(text) {
            return slot;
        }

        let slot = self.plain.len();
        let raw = self.plain[slot.saturating_sub(BACKREF_WINDOW)..]
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, earlier)| {
                earlier.len() >= MIN_SHARED_PREFIX
                    && text.len() > earlier.len()
                    && text.starts_with(earlier.as_str())
            })
            .max_by_key(|(_, earlier)| earlier.len())
            .map_or_else(
                || RawString::Literal(text.to_string()),
                |(offset, earlier)| {
                    let back = slot - (slot.saturating_sub(BACKREF_WINDOW) + offset);
                    RawString::Extend(back as u32, text[earlier.len()..].to_string())
                },
            );

        self.payload.strings.push(raw);
        self.plain.push(text.to_string());
        self.slots.insert(text.to_string(), slot as u32);
        slot as u32
    }
}
