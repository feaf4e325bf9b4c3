//! Search relevance and ranking algorithms.
//!
//! Every candidate is placed in a [`MatchClass`] whose base score dominates the
//! bounded bonuses, so the classes stay strictly ordered. The engine relies on the
//! per-class upper bound to stop early once the result cap is full.

use crate::types::{ItemKind, TypeShape};
use serde::{Deserialize, Serialize};

/// Tunable weights for the ranking formula.
///
/// With the defaults, the minimum score of each class exceeds the maximum of the
/// next one, whatever the kind, doc and canonicality bonuses add up to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringWeights {
    pub exact: f64,
    pub prefix: f64,
    pub substring: f64,
    pub fuzzy: f64,
    pub path_segment: f64,
    pub doc_substring: f64,
    /// Subtracted per edit in the fuzzy class.
    pub edit_penalty: f64,
    pub edit_penalty_cap: f64,
    /// Subtracted per extra level for path-query descendants.
    pub depth_penalty: f64,
    pub depth_penalty_cap: f64,
    pub kind_callable: f64,
    pub kind_type: f64,
    pub kind_other: f64,
    /// Scaled by the IDF-weighted fraction of query terms found in the summary.
    pub doc_overlap: f64,
    /// Scaled by `path_canonicality_score / 100`.
    pub canonicality: f64,
    pub type_param: f64,
    pub type_return: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exact: 1000.0,
            prefix: 800.0,
            substring: 600.0,
            fuzzy: 500.0,
            path_segment: 300.0,
            doc_substring: 100.0,
            edit_penalty: 25.0,
            edit_penalty_cap: 100.0,
            depth_penalty: 10.0,
            depth_penalty_cap: 100.0,
            kind_callable: 15.0,
            kind_type: 10.0,
            kind_other: 0.0,
            doc_overlap: 25.0,
            canonicality: 20.0,
            type_param: 100.0,
            type_return: 200.0,
        }
    }
}

impl ScoringWeights {
    pub fn kind_bonus(&self, kind: ItemKind) -> f64 {
        match kind {
            ItemKind::Function | ItemKind::Macro => self.kind_callable,
            ItemKind::Struct | ItemKind::Enum | ItemKind::Interface => self.kind_type,
            ItemKind::Module | ItemKind::Const | ItemKind::Static => self.kind_other,
        }
    }

    /// Largest sum of the bonuses that apply on top of any class base.
    pub fn max_bonus(&self) -> f64 {
        let kind = self
            .kind_callable
            .max(self.kind_type)
            .max(self.kind_other)
            .max(0.0);
        kind + self.doc_overlap.max(0.0) + self.canonicality.max(0.0)
    }

    pub fn base(&self, class: MatchClass) -> f64 {
        match class {
            MatchClass::Exact => self.exact,
            MatchClass::Prefix => self.prefix,
            MatchClass::Substring => self.substring,
            MatchClass::Fuzzy => self.fuzzy,
            MatchClass::PathSegment => self.path_segment,
            MatchClass::DocSubstring => self.doc_substring,
        }
    }

    /// Upper bound of any score in `class`.
    pub fn upper_bound(&self, class: MatchClass) -> f64 {
        self.base(class) + self.max_bonus()
    }

    /// Penalties are never negative.
    pub fn edit_cost(&self, distance: usize) -> f64 {
        (distance as f64 * self.edit_penalty.max(0.0)).min(self.edit_penalty_cap.max(0.0))
    }

    pub fn depth_cost(&self, extra_depth: usize) -> f64 {
        (extra_depth as f64 * self.depth_penalty.max(0.0)).min(self.depth_penalty_cap.max(0.0))
    }
}

/// How a candidate matched a text query, best first.
///
/// Path queries reuse the classes: exact path, last-segment prefix, descendant,
/// and suffix match map to `Exact`, `Prefix`, `Substring` and `PathSegment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchClass {
    Exact,
    Prefix,
    Substring,
    Fuzzy,
    PathSegment,
    DocSubstring,
}

impl MatchClass {
    pub const ALL: [Self; 6] = [
        Self::Exact,
        Self::Prefix,
        Self::Substring,
        Self::Fuzzy,
        Self::PathSegment,
        Self::DocSubstring,
    ];
}

/// Maximum edit distance for a fuzzy name match: one edit per six query characters.
pub fn edit_threshold(query: &str) -> usize {
    query.chars().count() / 6
}

/// Structural match quality of a candidate shape against a query shape, in `[0, 1]`.
///
/// - 1.0: identical structure (generic names compared case-insensitively)
/// - 0.75: both generic, different names
/// - 0.5: one side generic
/// - `0.5 + 0.5 * avg(args)`: same base name, arguments compared positionally
/// - 0.0: different base names
pub fn shape_match(query: &TypeShape, candidate: &TypeShape) -> f64 {
    match (query.is_placeholder(), candidate.is_placeholder()) {
        (true, true) if query.name.eq_ignore_ascii_case(&candidate.name) => 1.0,
        (true, true) => 0.75,
        (true, false) | (false, true) => 0.5,
        (false, false) => {
            if !query.name.eq_ignore_ascii_case(&candidate.name) {
                0.0
            } else if query.args.is_empty() {
                1.0
            } else if query.args.len() != candidate.args.len() {
                0.5
            } else {
                let total: f64 = query
                    .args
                    .iter()
                    .zip(&candidate.args)
                    .map(|(q, c)| shape_match(q, c))
                    .sum();
                0.5 + 0.5 * total / query.args.len() as f64
            }
        }
    }
}

/// Order-insensitive multiset match of query parameters against candidate parameters.
///
/// Pairs are assigned greedily, best quality first; each candidate parameter is used
/// at most once. Returns the summed quality divided by the number of query parameters.
pub fn param_match_fraction(query: &[TypeShape], candidate: &[TypeShape]) -> f64 {
    if query.is_empty() {
        return 0.0;
    }

    let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(query.len() * candidate.len());
    for (qi, q) in query.iter().enumerate() {
        for (ci, c) in candidate.iter().enumerate() {
            let quality = shape_match(q, c);
            if quality > 0.0 {
                pairs.push((quality, qi, ci));
            }
        }
    }
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut query_used = vec![false; query.len()];
    let mut candidate_used = vec![false; candidate.len()];
    let mut total = 0.0;
    for (quality, qi, ci) in pairs {
        if !query_used[qi] && !candidate_used[ci] {
            query_used[qi] = true;
            candidate_used[ci] = true;
            total += quality;
        }
    }

    total / query.len() as f64
}

/// Whether `path` ends with `query`, where the last query segment may be a prefix.
///
/// For example, `["vec", "ve"]` matches `["alloc", "vec", "vecdeque"]`.
pub fn path_suffix_match(path: &[String], query: &[String]) -> bool {
    let Some((last_query, leading_query)) = query.split_last() else {
        return false;
    };
    if path.len() < query.len() {
        return false;
    }

    let suffix = &path[path.len() - query.len()..];
    let Some((last, leading)) = suffix.split_last() else {
        return false;
    };
    leading == leading_query && last.starts_with(last_query.as_str())
}

/// Calculate a canonicality score for a path.
///
/// More canonical paths (shorter, fewer internal markers) get higher scores.
/// This helps prioritize public, stable API paths over internal re-exports.
///
/// Scoring:
/// - Base score: 100
/// - Penalty: -8 per additional path segment (beyond the first)
/// - Penalty: -40 for internal markers (_core, _private, _internal, __, etc.)
pub fn path_canonicality_score(path: &str) -> i32 {
    let segments: Vec<&str> = path.split("::").collect();
    let mut score = 100;

    score -= (segments.len() as i32 - 1) * 8;

    let internal_markers = [
        "_core",
        "_private",
        "_internal",
        "internal",
        "private",
        "__",
    ];
    for segment in &segments {
        if internal_markers.iter().any(|marker| segment.contains(marker)) {
            score -= 40;
        }
    }

    score
}

/// Canonicality mapped into `[0, 1]`.
pub fn canonicality_fraction(path: &str) -> f64 {
    f64::from(path_canonicality_score(path).clamp(0, 100)) / 100.0
}
