//! The registration and query API: one owner for the registries, the index and the engine.

use crate::config::SearchConfig;
use crate::error::{AlreadyAttachedError, ParseError, SchemaError};
use crate::implementors::{ImplementorConsumer, ImplementorPayload, ImplementorRegistry};
use crate::search::{PackageIndexBuilder, QueryEngine, SymbolIndex, parse};
use crate::shard::{RegisterOutcome, ShardDecoder, ShardPayload, ShardRegistry};
use crate::types::SearchResult;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

/// Counters describing the loaded corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub packages: usize,
    pub shards: usize,
    pub symbols: usize,
    pub indexed_symbols: usize,
    pub interfaces: usize,
    pub implementors: usize,
    pub consumer_attached: bool,
    pub cached_queries: usize,
}

/// Owns all search state. Writes go through `&mut self`, so the last registration
/// for a key always wins.
pub struct SearchState {
    shards: ShardRegistry,
    implementors: ImplementorRegistry,
    index: SymbolIndex,
    engine: QueryEngine,
    config: SearchConfig,
    /// raw query → results; cleared on every change
    cache: Option<LruCache<String, Vec<SearchResult>>>,
}

impl std::fmt::Debug for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchState")
            .field("shards", &self.shards.shard_count())
            .field("symbols", &self.shards.size())
            .field("implementors", &self.implementors)
            .field("index", &self.index)
            .finish()
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl SearchState {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            shards: ShardRegistry::new(),
            implementors: ImplementorRegistry::new(),
            index: SymbolIndex::new(),
            engine: config.engine(),
            cache: NonZeroUsize::new(config.query_cache_size).map(LruCache::new),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn shards(&self) -> &ShardRegistry {
        &self.shards
    }

    pub fn implementors(&self) -> &ImplementorRegistry {
        &self.implementors
    }

    pub fn index(&self) -> &SymbolIndex {
        &self.index
    }

    /// Register one description shard. The package index is rebuilt before the next query.
    pub fn register_shard(
        &mut self,
        package: &str,
        shard_index: u32,
        payload: &ShardPayload,
    ) -> Result<RegisterOutcome, SchemaError> {
        let outcome = self.shards.register(package, shard_index, payload)?;
        if outcome != RegisterOutcome::Unchanged {
            self.invalidate();
        }
        Ok(outcome)
    }

    /// Like [`register_shard`](Self::register_shard), but decodes and indexes in chunks of
    /// `yield_every` records, yielding to the runtime between chunks.
    pub async fn register_shard_yielding(
        &mut self,
        package: &str,
        shard_index: u32,
        payload: &ShardPayload,
    ) -> Result<RegisterOutcome, SchemaError> {
        let fingerprint = payload.fingerprint();
        if self.shards.is_unchanged(package, shard_index, fingerprint) {
            tracing::debug!(
                "Shard {}/{} re-registered with identical contents",
                package,
                shard_index
            );
            return Ok(RegisterOutcome::Unchanged);
        }

        let start = Instant::now();
        let chunk = self.config.yield_every.max(1);
        let decoder = ShardDecoder::new(package, shard_index, payload).inspect_err(|e| {
            tracing::warn!("Rejected shard {}/{}: {}", package, shard_index, e);
        })?;

        let mut entries = Vec::with_capacity(decoder.len());
        let mut offset = 0;
        while offset < decoder.len() {
            entries.extend(decoder.decode_range(offset..offset + chunk));
            offset += chunk;
            tokio::task::yield_now().await;
        }
        let outcome = self.shards.insert(package, shard_index, fingerprint, entries);

        let symbols: Vec<_> = self.shards.entries_for(package).map(Arc::clone).collect();
        let mut builder = PackageIndexBuilder::new(package);
        for batch in symbols.chunks(chunk) {
            for entry in batch {
                builder.push(Arc::clone(entry));
            }
            tokio::task::yield_now().await;
        }
        self.index.install(builder.finish());
        self.shards.mark_clean(package);
        self.invalidate();

        tracing::debug!(
            "Chunked registration of {}/{} took {:?}",
            package,
            shard_index,
            start.elapsed()
        );
        Ok(outcome)
    }

    /// Register implementor records. Returns the number accepted; never fails.
    pub fn register_implementors(&mut self, package: &str, payload: &ImplementorPayload) -> usize {
        self.implementors.register(package, payload)
    }

    pub fn attach_implementor_consumer(
        &mut self,
        consumer: ImplementorConsumer,
    ) -> Result<(), AlreadyAttachedError> {
        self.implementors.attach(consumer)
    }

    /// Ranked results for `raw`, capped at the configured result cap.
    pub fn search(&mut self, raw: &str) -> Result<Vec<SearchResult>, ParseError> {
        let query = parse(raw)?;
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.refresh();
        if let Some(cached) = self.cache.as_mut().and_then(|cache| cache.get(raw)) {
            tracing::debug!("Query cache hit for '{}'", raw);
            return Ok(cached.clone());
        }

        let start = Instant::now();
        let results: Vec<SearchResult> = self
            .engine
            .evaluate(&self.index, &query)
            .into_iter()
            .map(|scored| SearchResult {
                path: scored.full_path,
                kind: scored.entry.kind,
                doc_summary: scored.entry.doc_summary.clone(),
                score: scored.score,
                package: scored.entry.package.clone(),
            })
            .collect();
        tracing::debug!(
            "Query '{}' returned {} results in {:?}",
            raw,
            results.len(),
            start.elapsed()
        );

        if let Some(cache) = self.cache.as_mut() {
            cache.put(raw.to_string(), results.clone());
        }
        Ok(results)
    }

    /// [`search`](Self::search), truncated to `limit`.
    pub fn search_with_limit(
        &mut self,
        raw: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ParseError> {
        let mut results = self.search(raw)?;
        results.truncate(limit);
        Ok(results)
    }

    /// Rebuild dirty packages and corpus aggregates.
    pub fn refresh(&mut self) {
        if self.shards.is_dirty() {
            let rebuilt = self.index.refresh(&mut self.shards);
            tracing::debug!("Rebuilt {} package indices", rebuilt);
        }
        self.index.ensure_fresh();
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            packages: self.shards.packages().len(),
            shards: self.shards.shard_count(),
            symbols: self.shards.size(),
            indexed_symbols: self.index.symbol_count(),
            interfaces: self.implementors.interfaces().count(),
            implementors: self.implementors.len(),
            consumer_attached: self.implementors.is_attached(),
            cached_queries: self.cache.as_ref().map_or(0, LruCache::len),
        }
    }

    fn invalidate(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }
}
