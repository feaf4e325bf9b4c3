//! Per-package derived search structures and the corpus-wide aggregates.
//!
//! Each package gets its own immutable [`PackageIndex`], shared behind an `Arc`.
//! A registration rebuilds only the packages it touched; corpus-wide document
//! frequencies are marked stale and recomputed lazily before the next query.

use super::tokenize::{TermHash, term_set};
use crate::markup::to_plain_text;
use crate::shard::ShardRegistry;
use crate::types::{SymbolEntry, TypeShape};
use ahash::AHashMap;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

/// Position of a symbol within its [`PackageIndex`].
pub type Slot = usize;

/// A symbol plus the lowercased forms the matchers compare against.
#[derive(Debug)]
pub struct IndexedSymbol {
    pub entry: Arc<SymbolEntry>,
    pub full_path: String,
    pub(crate) lower_name: String,
    /// Lowercased container segments followed by the lowercased name.
    pub(crate) lower_segments: Vec<String>,
    pub(crate) lower_doc: String,
    pub(crate) doc_terms: Vec<TermHash>,
    pub(crate) canonicality: f64,
}

impl IndexedSymbol {
    fn new(entry: Arc<SymbolEntry>, stemmer: &Stemmer) -> Self {
        let full_path = entry.full_path();
        let plain_doc = to_plain_text(&entry.doc_summary);
        let lower_segments = entry
            .path
            .iter()
            .chain(std::iter::once(&entry.name))
            .map(|segment| segment.to_lowercase())
            .collect();

        Self {
            lower_name: entry.name.to_lowercase(),
            lower_segments,
            lower_doc: plain_doc.to_lowercase(),
            doc_terms: term_set(&plain_doc, stemmer),
            canonicality: super::scoring::canonicality_fraction(&full_path),
            full_path,
            entry,
        }
    }

    /// Lowercased `::`-joined full path.
    pub(crate) fn lower_path(&self) -> String {
        self.lower_segments.join("::")
    }

    /// Container segments only, without the name.
    pub(crate) fn lower_container(&self) -> &[String] {
        &self.lower_segments[..self.lower_segments.len() - 1]
    }
}

/// Derived search structures for one package.
#[derive(Debug, Default)]
pub struct PackageIndex {
    package: String,
    symbols: Vec<IndexedSymbol>,
    /// lowercase name → slots
    names: BTreeMap<String, Vec<Slot>>,
    /// lowercase full path → slots
    paths: BTreeMap<String, Vec<Slot>>,
    /// lowercase container segment → slots
    segments: BTreeMap<String, Vec<Slot>>,
    /// lowercase return-shape name → slots; no return is filed under `()`
    returns: AHashMap<String, Vec<Slot>>,
    /// slots whose return shape is a generic placeholder
    generic_returns: Vec<Slot>,
    /// every slot that has a signature
    typed: Vec<Slot>,
    /// term → number of symbols whose summary contains it
    doc_freq: AHashMap<TermHash, u32>,
}

impl PackageIndex {
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, slot: Slot) -> &IndexedSymbol {
        &self.symbols[slot]
    }

    pub fn symbols(&self) -> &[IndexedSymbol] {
        &self.symbols
    }

    pub(crate) fn name_exact(&self, name: &str) -> &[Slot] {
        self.names.get(name).map_or(&[], Vec::as_slice)
    }

    /// Name keys starting with `prefix`, including an exact key.
    pub(crate) fn names_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [Slot])> + 'a {
        prefixed(&self.names, prefix)
    }

    /// Every distinct name, for substring and edit-distance scans.
    pub(crate) fn names(&self) -> impl Iterator<Item = (&str, &[Slot])> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub(crate) fn paths_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [Slot])> + 'a {
        prefixed(&self.paths, prefix)
    }

    pub(crate) fn segments_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [Slot])> + 'a {
        prefixed(&self.segments, prefix)
    }

    pub(crate) fn returning(&self, key: &str) -> &[Slot] {
        self.returns.get(key).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn generic_returns(&self) -> &[Slot] {
        &self.generic_returns
    }

    pub(crate) fn typed(&self) -> &[Slot] {
        &self.typed
    }
}

fn prefixed<'a>(
    map: &'a BTreeMap<String, Vec<Slot>>,
    prefix: &'a str,
) -> impl Iterator<Item = (&'a str, &'a [Slot])> + 'a {
    map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
        .map(|(key, slots)| (key.as_str(), slots.as_slice()))
}

/// Accumulates one package's symbols; large packages can be fed in chunks.
pub struct PackageIndexBuilder {
    index: PackageIndex,
    stemmer: Stemmer,
    started: Instant,
}

impl PackageIndexBuilder {
    pub fn new(package: &str) -> Self {
        Self {
            index: PackageIndex {
                package: package.to_string(),
                ..PackageIndex::default()
            },
            stemmer: Stemmer::create(Algorithm::English),
            started: Instant::now(),
        }
    }

    pub fn push(&mut self, entry: Arc<SymbolEntry>) {
        let index = &mut self.index;
        let slot = index.symbols.len();
        let symbol = IndexedSymbol::new(entry, &self.stemmer);

        index
            .names
            .entry(symbol.lower_name.clone())
            .or_default()
            .push(slot);
        index.paths.entry(symbol.lower_path()).or_default().push(slot);
        for segment in symbol.lower_container() {
            let slots = index.segments.entry(segment.clone()).or_default();
            if slots.last() != Some(&slot) {
                slots.push(slot);
            }
        }

        if let Some(signature) = &symbol.entry.signature {
            index.typed.push(slot);
            match &signature.ret {
                Some(ret) if ret.is_placeholder() => index.generic_returns.push(slot),
                Some(ret) => index.returns.entry(ret.key()).or_default().push(slot),
                None => index
                    .returns
                    .entry(TypeShape::UNIT.to_string())
                    .or_default()
                    .push(slot),
            }
        }

        for term in &symbol.doc_terms {
            *index.doc_freq.entry(*term).or_insert(0) += 1;
        }

        index.symbols.push(symbol);
    }

    pub fn len(&self) -> usize {
        self.index.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.symbols.is_empty()
    }

    pub fn finish(self) -> PackageIndex {
        tracing::info!(
            "Built index for '{}': {} symbols, {} names, {} typed in {:?}",
            self.index.package,
            self.index.symbols.len(),
            self.index.names.len(),
            self.index.typed.len(),
            self.started.elapsed()
        );
        self.index
    }
}

impl std::fmt::Debug for PackageIndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageIndexBuilder")
            .field("package", &self.index.package)
            .field("symbols", &self.index.symbols.len())
            .finish_non_exhaustive()
    }
}

/// Corpus-wide aggregates used for IDF weighting.
#[derive(Debug, Default)]
pub struct CorpusStats {
    doc_freq: AHashMap<TermHash, u32>,
    documents: usize,
}

impl CorpusStats {
    /// `ln(1 + N / df)`, or `None` for a term no summary contains.
    pub(crate) fn idf(&self, term: TermHash) -> Option<f64> {
        let df = *self.doc_freq.get(&term)?;
        (df > 0).then(|| (1.0 + self.documents as f64 / f64::from(df)).ln())
    }

    pub fn documents(&self) -> usize {
        self.documents
    }
}

/// The queryable index over every registered package.
pub struct SymbolIndex {
    packages: BTreeMap<String, Arc<PackageIndex>>,
    corpus: CorpusStats,
    stale: bool,
    stemmer: Stemmer,
}

impl std::fmt::Debug for SymbolIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolIndex")
            .field("packages", &self.packages.len())
            .field("symbols", &self.symbol_count())
            .field("stale", &self.stale)
            .finish()
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self {
            packages: BTreeMap::new(),
            corpus: CorpusStats::default(),
            stale: false,
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Rebuild every package the registry marked dirty. Returns how many were rebuilt.
    pub fn refresh(&mut self, shards: &mut ShardRegistry) -> usize {
        let dirty = shards.take_dirty();
        for package in &dirty {
            let mut builder = PackageIndexBuilder::new(package);
            for entry in shards.entries_for(package) {
                builder.push(Arc::clone(entry));
            }
            self.install(builder.finish());
        }
        dirty.len()
    }

    /// Replace one package's index. Other packages are left untouched.
    pub fn install(&mut self, index: PackageIndex) {
        self.packages
            .insert(index.package.clone(), Arc::new(index));
        self.stale = true;
    }

    /// Recompute corpus aggregates if a package changed since the last call.
    pub fn ensure_fresh(&mut self) {
        if !self.stale {
            return;
        }

        let start = Instant::now();
        let mut corpus = CorpusStats::default();
        for package in self.packages.values() {
            corpus.documents += package.symbols.len();
            for (term, count) in &package.doc_freq {
                *corpus.doc_freq.entry(*term).or_insert(0) += count;
            }
        }
        tracing::debug!(
            "Recomputed corpus stats: {} terms over {} symbols in {:?}",
            corpus.doc_freq.len(),
            corpus.documents,
            start.elapsed()
        );

        self.corpus = corpus;
        self.stale = false;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn corpus(&self) -> &CorpusStats {
        &self.corpus
    }

    pub fn package(&self, name: &str) -> Option<&Arc<PackageIndex>> {
        self.packages.get(name)
    }

    /// Package indices in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Arc<PackageIndex>> {
        self.packages.values()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.packages.values().map(|p| p.len()).sum()
    }

    /// Query text as term hashes, using the same tokenizer as the summaries.
    pub(crate) fn query_terms(&self, text: &str) -> Vec<TermHash> {
        term_set(text, &self.stemmer)
    }
}
