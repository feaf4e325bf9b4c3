//! Query evaluation: tiered candidate generation, scoring, and capped top-k ranking.
//!
//! Candidates are generated one match class (tier) at a time, best tier first. Each
//! candidate is scored by the full classifier the first time it is seen, so a symbol's
//! score never depends on which tier produced it. Once the result cap is full and no
//! remaining tier can beat the worst kept score, generation stops. That cut can only
//! drop candidates that would have been rejected anyway, so pruning never changes the
//! result set.

use super::index::{IndexedSymbol, PackageIndex, Slot, SymbolIndex};
use super::query::{Query, QueryMode};
use super::scoring::{
    MatchClass, ScoringWeights, edit_threshold, param_match_fraction, path_suffix_match,
    shape_match,
};
use super::tokenize::TermHash;
use crate::types::{ItemKind, Signature, SymbolEntry, TypeShape};
use ahash::AHashSet;
use rapidfuzz::distance::levenshtein;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Default maximum number of results.
pub const DEFAULT_RESULT_CAP: usize = 200;

/// A ranked match.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSymbol {
    pub entry: Arc<SymbolEntry>,
    pub full_path: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct QueryEngine {
    cap: usize,
    prune: bool,
    weights: ScoringWeights,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_CAP, ScoringWeights::default())
    }
}

impl QueryEngine {
    pub fn new(cap: usize, weights: ScoringWeights) -> Self {
        Self {
            cap,
            prune: true,
            weights,
        }
    }

    /// Enable or disable early termination. Results are identical either way.
    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Evaluate `query`, best match first: score descending, then full path, package,
    /// shard and id ascending.
    pub fn evaluate(&self, index: &SymbolIndex, query: &Query) -> Vec<ScoredSymbol> {
        if self.cap == 0 {
            return Vec::new();
        }

        let ranked = match &query.mode {
            QueryMode::Empty => return Vec::new(),
            QueryMode::Name(name) => self.evaluate_name(index, query.kind, name),
            QueryMode::Path { segments, children } => {
                self.evaluate_path(index, query.kind, segments, *children)
            }
            QueryMode::Type(signature) => self.evaluate_type(index, query.kind, signature),
        };

        ranked
            .into_iter()
            .map(|ranked| ScoredSymbol {
                entry: Arc::clone(&ranked.symbol.entry),
                full_path: ranked.symbol.full_path.clone(),
                score: ranked.score,
            })
            .collect()
    }

    fn evaluate_name<'a>(
        &self,
        index: &'a SymbolIndex,
        kind: Option<ItemKind>,
        name: &str,
    ) -> Vec<Ranked<'a>> {
        let threshold = edit_threshold(name);
        let terms = index.query_terms(name);
        let tiers: Vec<(MatchClass, f64)> = MatchClass::ALL
            .into_iter()
            .filter(|class| *class != MatchClass::Fuzzy || threshold > 0)
            .map(|class| (class, self.weights.upper_bound(class)))
            .collect();

        let candidates = |package: &'a PackageIndex, class: MatchClass| -> Vec<Slot> {
            match class {
                MatchClass::Exact => package.name_exact(name).to_vec(),
                MatchClass::Prefix => flatten(package.names_with_prefix(name)),
                MatchClass::Substring => {
                    flatten(package.names().filter(|(key, _)| key.contains(name)))
                }
                MatchClass::Fuzzy => flatten(
                    package
                        .names()
                        .filter(|(key, _)| within_edits(key, name, threshold).is_some()),
                ),
                MatchClass::PathSegment => flatten(package.segments_with_prefix(name)),
                MatchClass::DocSubstring => (0..package.len())
                    .filter(|slot| package.symbol(*slot).lower_doc.contains(name))
                    .collect(),
            }
        };

        let score = |symbol: &IndexedSymbol| {
            let (class, penalty) = classify_name(symbol, name, threshold, &self.weights)?;
            Some(self.weights.base(class) - penalty + self.bonuses(index, symbol, &terms))
        };

        self.collect(index, kind, &tiers, candidates, score)
    }

    fn evaluate_path<'a>(
        &self,
        index: &'a SymbolIndex,
        kind: Option<ItemKind>,
        segments: &[String],
        children: bool,
    ) -> Vec<Ranked<'a>> {
        let joined = segments.join("::");
        let descendants = format!("{joined}::");
        let terms = segments
            .last()
            .map(|last| index.query_terms(last))
            .unwrap_or_default();

        let classes: &[MatchClass] = if children {
            &[MatchClass::Substring, MatchClass::PathSegment]
        } else {
            &[
                MatchClass::Exact,
                MatchClass::Prefix,
                MatchClass::Substring,
                MatchClass::PathSegment,
            ]
        };
        let tiers: Vec<(MatchClass, f64)> = classes
            .iter()
            .map(|class| (*class, self.weights.upper_bound(*class)))
            .collect();

        let candidates = |package: &'a PackageIndex, class: MatchClass| -> Vec<Slot> {
            match class {
                MatchClass::Exact => flatten(
                    package
                        .paths_with_prefix(&joined)
                        .filter(|(key, _)| *key == joined),
                ),
                MatchClass::Prefix => flatten(package.paths_with_prefix(&joined)),
                MatchClass::Substring => flatten(package.paths_with_prefix(&descendants)),
                MatchClass::PathSegment => flatten(
                    package
                        .segments_with_prefix(&segments[0])
                        .filter(|(key, _)| *key == segments[0]),
                ),
                MatchClass::Fuzzy | MatchClass::DocSubstring => Vec::new(),
            }
        };

        let score = |symbol: &IndexedSymbol| {
            let (class, penalty) = classify_path(symbol, segments, children, &self.weights)?;
            Some(self.weights.base(class) - penalty + self.bonuses(index, symbol, &terms))
        };

        self.collect(index, kind, &tiers, candidates, score)
    }

    fn evaluate_type<'a>(
        &self,
        index: &'a SymbolIndex,
        kind: Option<ItemKind>,
        query: &Signature,
    ) -> Vec<Ranked<'a>> {
        let weights = &self.weights;
        let bonus_bound = weights
            .kind_callable
            .max(weights.kind_type)
            .max(weights.kind_other)
            .max(0.0)
            + weights.canonicality.max(0.0);
        let full = weights.type_return.max(0.0) + weights.type_param.max(0.0) + bonus_bound;
        // A concrete return only meets a placeholder at quality 0.5.
        let generic = 0.5 * weights.type_return.max(0.0) + weights.type_param.max(0.0) + bonus_bound;

        let concrete_return = query.ret.as_ref().filter(|ret| !ret.is_placeholder());
        let tiers: Vec<(TypeTier, f64)> = match concrete_return {
            Some(_) => vec![(TypeTier::ReturnBucket, full), (TypeTier::GenericReturn, generic)],
            None => vec![(TypeTier::AllTyped, full)],
        };

        let candidates = |package: &'a PackageIndex, tier: TypeTier| -> Vec<Slot> {
            match (tier, concrete_return) {
                (TypeTier::ReturnBucket, Some(ret)) => package.returning(&ret.key()).to_vec(),
                (TypeTier::GenericReturn, _) => package.generic_returns().to_vec(),
                (TypeTier::AllTyped, _) => package.typed().to_vec(),
                (TypeTier::ReturnBucket, None) => Vec::new(),
            }
        };

        let score = |symbol: &IndexedSymbol| {
            let candidate = symbol.entry.signature.as_ref()?;
            let (ret_quality, param_fraction) = type_match(query, candidate)?;
            Some(
                weights.type_return * ret_quality
                    + weights.type_param * param_fraction
                    + weights.kind_bonus(symbol.entry.kind)
                    + weights.canonicality * symbol.canonicality,
            )
        };

        self.collect(index, kind, &tiers, candidates, score)
    }

    /// Kind, doc-overlap and canonicality bonuses shared by name and path queries.
    fn bonuses(&self, index: &SymbolIndex, symbol: &IndexedSymbol, terms: &[TermHash]) -> f64 {
        self.weights.kind_bonus(symbol.entry.kind)
            + self.weights.doc_overlap * doc_overlap(index, symbol, terms)
            + self.weights.canonicality * symbol.canonicality
    }

    /// Drive the tiers in order and keep the best `cap` candidates.
    fn collect<'a, T: Copy + std::fmt::Debug>(
        &self,
        index: &'a SymbolIndex,
        kind: Option<ItemKind>,
        tiers: &[(T, f64)],
        candidates: impl Fn(&'a PackageIndex, T) -> Vec<Slot>,
        score: impl Fn(&'a IndexedSymbol) -> Option<f64>,
    ) -> Vec<Ranked<'a>> {
        let mut top = TopK::new(self.cap);
        let mut seen: AHashSet<(usize, Slot)> = AHashSet::new();

        for (position, (tier, _)) in tiers.iter().enumerate() {
            let remaining_bound = tiers[position..]
                .iter()
                .map(|(_, bound)| *bound)
                .fold(f64::NEG_INFINITY, f64::max);
            if self.prune && top.worst_score().is_some_and(|worst| remaining_bound < worst) {
                tracing::trace!(
                    "Pruned at tier {:?}: bound {} below kept minimum",
                    tier,
                    remaining_bound
                );
                break;
            }

            for (ordinal, package) in index.packages().enumerate() {
                for slot in candidates(package, *tier) {
                    if !seen.insert((ordinal, slot)) {
                        continue;
                    }
                    let symbol = package.symbol(slot);
                    if kind.is_some_and(|kind| kind != symbol.entry.kind) {
                        continue;
                    }
                    if let Some(score) = score(symbol) {
                        top.offer(Ranked { score, symbol });
                    }
                }
            }
        }

        tracing::debug!(
            "Scored {} candidates, kept {}",
            seen.len(),
            top.heap.len()
        );
        top.into_sorted()
    }
}

#[derive(Debug, Clone, Copy)]
enum TypeTier {
    ReturnBucket,
    GenericReturn,
    AllTyped,
}

/// Best match class of a symbol for a lowercase name query, with its penalty.
fn classify_name(
    symbol: &IndexedSymbol,
    name: &str,
    threshold: usize,
    weights: &ScoringWeights,
) -> Option<(MatchClass, f64)> {
    let lower = symbol.lower_name.as_str();
    if lower == name {
        return Some((MatchClass::Exact, 0.0));
    }
    if lower.starts_with(name) {
        return Some((MatchClass::Prefix, 0.0));
    }
    if lower.contains(name) {
        return Some((MatchClass::Substring, 0.0));
    }
    if let Some(distance) = within_edits(lower, name, threshold) {
        return Some((MatchClass::Fuzzy, weights.edit_cost(distance)));
    }
    if symbol
        .lower_container()
        .iter()
        .any(|segment| segment.starts_with(name))
    {
        return Some((MatchClass::PathSegment, 0.0));
    }
    if symbol.lower_doc.contains(name) {
        return Some((MatchClass::DocSubstring, 0.0));
    }
    None
}

/// Best match class of a symbol for lowercase path segments, with its depth penalty.
fn classify_path(
    symbol: &IndexedSymbol,
    query: &[String],
    children: bool,
    weights: &ScoringWeights,
) -> Option<(MatchClass, f64)> {
    let path = symbol.lower_segments.as_slice();

    if children {
        if path.len() > query.len() && path.starts_with(query) {
            let extra = path.len() - query.len() - 1;
            return Some((MatchClass::Substring, weights.depth_cost(extra)));
        }
        return symbol
            .lower_container()
            .ends_with(query)
            .then_some((MatchClass::PathSegment, 0.0));
    }

    if path == query {
        return Some((MatchClass::Exact, 0.0));
    }
    if path.len() == query.len() && path_suffix_match(path, query) {
        return Some((MatchClass::Prefix, 0.0));
    }
    if path.len() > query.len() && path.starts_with(query) {
        let extra = path.len() - query.len();
        return Some((MatchClass::Substring, weights.depth_cost(extra)));
    }
    path_suffix_match(path, query).then_some((MatchClass::PathSegment, 0.0))
}

/// Return quality and parameter fraction, or `None` when the candidate is rejected.
fn type_match(query: &Signature, candidate: &Signature) -> Option<(f64, f64)> {
    let ret_quality = match &query.ret {
        Some(want) => {
            let unit = TypeShape::named(TypeShape::UNIT);
            let have = candidate.ret.as_ref().unwrap_or(&unit);
            let quality = shape_match(want, have);
            if quality <= 0.0 {
                return None;
            }
            quality
        }
        None => 0.0,
    };

    let param_fraction = param_match_fraction(&query.params, &candidate.params);
    if !query.params.is_empty() && param_fraction <= 0.0 {
        return None;
    }

    Some((ret_quality, param_fraction))
}

/// Edit distance between `candidate` and `query` if it is within `threshold` (and non-zero
/// threshold). A length difference above the threshold rules a pair out early.
fn within_edits(candidate: &str, query: &str, threshold: usize) -> Option<usize> {
    if threshold == 0 {
        return None;
    }
    let (a, b) = (candidate.chars().count(), query.chars().count());
    if a.abs_diff(b) > threshold {
        return None;
    }
    let distance = levenshtein::distance(candidate.chars(), query.chars());
    (distance <= threshold).then_some(distance)
}

/// IDF-weighted fraction of query terms present in the symbol's summary, in `[0, 1]`.
fn doc_overlap(index: &SymbolIndex, symbol: &IndexedSymbol, terms: &[TermHash]) -> f64 {
    let corpus = index.corpus();
    let mut total = 0.0;
    let mut matched = 0.0;
    for term in terms {
        let Some(idf) = corpus.idf(*term) else {
            continue;
        };
        total += idf;
        if symbol.doc_terms.binary_search(term).is_ok() {
            matched += idf;
        }
    }
    if total > 0.0 {
        (matched / total).min(1.0)
    } else {
        0.0
    }
}

fn flatten<'a>(groups: impl Iterator<Item = (&'a str, &'a [Slot])>) -> Vec<Slot> {
    groups.flat_map(|(_, slots)| slots.iter().copied()).collect()
}

/// A scored candidate. Ordered so that a *greater* value is a *worse* result, which
/// makes the max-heap in [`TopK`] evict the worst kept candidate first.
#[derive(Debug)]
struct Ranked<'a> {
    score: f64,
    symbol: &'a IndexedSymbol,
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (&self.symbol.entry, &other.symbol.entry);
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.symbol.full_path.cmp(&other.symbol.full_path))
            .then_with(|| a.package.cmp(&b.package))
            .then_with(|| a.shard_index.cmp(&b.shard_index))
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

/// Bounded collection of the best `cap` candidates.
struct TopK<'a> {
    cap: usize,
    heap: BinaryHeap<Ranked<'a>>,
}

impl<'a> TopK<'a> {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            heap: BinaryHeap::with_capacity(cap.min(1024) + 1),
        }
    }

    fn offer(&mut self, candidate: Ranked<'a>) {
        if self.heap.len() < self.cap {
            self.heap.push(candidate);
        } else if let Some(mut worst) = self.heap.peek_mut()
            && candidate < *worst
        {
            *worst = candidate;
        }
    }

    /// Score of the worst kept candidate, once the cap is reached.
    fn worst_score(&self) -> Option<f64> {
        if self.heap.len() < self.cap {
            return None;
        }
        self.heap.peek().map(|worst| worst.score)
    }

    fn into_sorted(self) -> Vec<Ranked<'a>> {
        self.heap.into_sorted_vec()
    }
}
