//! Registry of per-package description shards.
//!
//! Shards are keyed by `(package, shard_index)` and are immutable once stored; a new
//! registration under the same key replaces the old one wholesale. Every change marks
//! its package dirty so the symbol index can rebuild just that package.

pub mod decode;
pub mod payload;

pub use decode::{ShardDecoder, decode_string_table};
pub use payload::{RawString, RecordSpec, ShardBuilder, ShardPayload};

use crate::error::SchemaError;
use crate::types::SymbolEntry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A registered, decoded shard.
#[derive(Debug, Clone)]
pub struct Shard {
    pub package: String,
    pub shard_index: u32,
    pub entries: Vec<Arc<SymbolEntry>>,
    pub fingerprint: u64,
}

/// What a registration did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First shard under this key.
    Inserted,
    /// Replaced a shard with different contents.
    Replaced,
    /// Same contents as the stored shard; nothing changed.
    Unchanged,
}

#[derive(Debug, Default)]
pub struct ShardRegistry {
    shards: BTreeMap<(String, u32), Shard>,
    dirty: BTreeSet<String>,
    symbol_count: usize,
}

impl ShardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, decode and store a shard, replacing any shard under the same key.
    ///
    /// On error nothing is modified, including earlier shards of the same package.
    pub fn register(
        &mut self,
        package: &str,
        shard_index: u32,
        payload: &ShardPayload,
    ) -> Result<RegisterOutcome, SchemaError> {
        let fingerprint = payload.fingerprint();
        if self.is_unchanged(package, shard_index, fingerprint) {
            tracing::debug!(
                "Shard {}/{} re-registered with identical contents",
                package,
                shard_index
            );
            return Ok(RegisterOutcome::Unchanged);
        }

        let decoder = ShardDecoder::new(package, shard_index, payload).inspect_err(|e| {
            tracing::warn!("Rejected shard {}/{}: {}", package, shard_index, e);
        })?;
        let entries = decoder.decode_range(0..decoder.len());

        Ok(self.insert(package, shard_index, fingerprint, entries))
    }

    /// Whether the stored shard under this key has the given fingerprint.
    pub fn is_unchanged(&self, package: &str, shard_index: u32, fingerprint: u64) -> bool {
        self.get(package, shard_index)
            .is_some_and(|shard| shard.fingerprint == fingerprint)
    }

    /// Store already-decoded entries. Callers must have validated them via [`ShardDecoder`].
    pub(crate) fn insert(
        &mut self,
        package: &str,
        shard_index: u32,
        fingerprint: u64,
        entries: Vec<SymbolEntry>,
    ) -> RegisterOutcome {
        let shard = Shard {
            package: package.to_string(),
            shard_index,
            entries: entries.into_iter().map(Arc::new).collect(),
            fingerprint,
        };
        let added = shard.entries.len();

        let outcome = match self.shards.insert((package.to_string(), shard_index), shard) {
            Some(previous) => {
                self.symbol_count -= previous.entries.len();
                RegisterOutcome::Replaced
            }
            None => RegisterOutcome::Inserted,
        };
        self.symbol_count += added;
        self.dirty.insert(package.to_string());

        tracing::info!(
            "Registered shard {}/{} ({} symbols, {:?})",
            package,
            shard_index,
            added,
            outcome
        );
        outcome
    }

    pub fn get(&self, package: &str, shard_index: u32) -> Option<&Shard> {
        self.shards.get(&(package.to_string(), shard_index))
    }

    /// All shards of `package`, in shard-index order.
    pub fn shards_for<'a>(&'a self, package: &str) -> impl Iterator<Item = &'a Shard> + 'a {
        self.shards
            .range((package.to_string(), 0)..=(package.to_string(), u32::MAX))
            .map(|(_, shard)| shard)
    }

    /// All symbols of `package`, in shard-index then record order.
    pub fn entries_for<'a>(
        &'a self,
        package: &str,
    ) -> impl Iterator<Item = &'a Arc<SymbolEntry>> + 'a {
        self.shards_for(package)
            .flat_map(|shard| shard.entries.iter())
    }

    /// Registered package names, sorted.
    pub fn packages(&self) -> Vec<&str> {
        let mut packages: Vec<&str> = self.shards.keys().map(|(p, _)| p.as_str()).collect();
        packages.dedup();
        packages
    }

    /// Drain the set of packages changed since the last call.
    pub fn take_dirty(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.dirty)
    }

    /// Clear one package's dirty flag after its index was rebuilt elsewhere.
    pub(crate) fn mark_clean(&mut self, package: &str) {
        self.dirty.remove(package);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Total registered symbol count (diagnostic only).
    pub fn size(&self) -> usize {
        self.symbol_count
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
