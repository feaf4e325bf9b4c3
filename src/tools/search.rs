//! Ranked symbol search handler.

use crate::markup::to_plain_text;
use crate::state::SearchState;
use crate::types::SearchResult;
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    /// Query: a name (`Iterator`), a path (`std::vec::Vec`, `core::iter::`), or a type
    /// signature (`Vec<T>, usize -> Option<T>`). Prefix with `fn:`, `struct:`, `trait:` etc.
    /// to filter by kind.
    pub query: String,
    /// Maximum number of results to return (default: 10)
    #[serde(default = "default_limit")]
    pub limit: Option<usize>,
}

fn default_limit() -> Option<usize> {
    Some(10)
}

pub async fn handle_search(state: &Mutex<SearchState>, request: SearchRequest) -> Result<String, String> {
    let limit = request.limit.unwrap_or(10);
    let results = state
        .lock()
        .await
        .search_with_limit(&request.query, limit)
        .map_err(|e| format!("Invalid query '{}': {}", request.query, e))?;

    if results.is_empty() {
        let mut msg = format!("No results found for '{}'.\n\n", request.query);
        msg.push_str("Search tips:\n");
        msg.push_str("• Try a shorter name or a prefix: 'Iter' matches 'Iterator'\n");
        msg.push_str("• Small typos are tolerated in longer names\n");
        msg.push_str("• Use 'module::' to list the children of a module\n");
        msg.push_str("• Use '->' for type search: 'Vec<T> -> Option<T>'\n");
        return Ok(msg);
    }

    Ok(format_search_results(&results, &request.query))
}

/// Format search results into a readable string output.
pub(crate) fn format_search_results(results: &[SearchResult], query: &str) -> String {
    let mut output = format!("Search results for '{}':\n\n", query);
    let max_score = results
        .first()
        .map(|r| r.score)
        .filter(|score| *score > 0.0)
        .unwrap_or(1.0);

    for (idx, result) in results.iter().enumerate() {
        let relevance = (result.score / max_score * 100.0).round().clamp(0.0, 100.0);
        let _ = writeln!(
            output,
            "{}. `{}` ({}, {}) - relevance: {}%",
            idx + 1,
            result.path,
            result.kind,
            result.package,
            relevance
        );

        let summary = to_plain_text(&result.doc_summary);
        if !summary.is_empty() {
            let _ = writeln!(output, "   {}", summary);
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemKind;
    use assert2::check;

    #[test]
    fn test_format_search_results() {
        let results = vec![
            SearchResult {
                path: "core::iter::Iterator".into(),
                kind: ItemKind::Interface,
                doc_summary: "An interface for dealing with <code>iterators</code>.".into(),
                score: 1040.0,
                package: "core".into(),
            },
            SearchResult {
                path: "core::iter::IteratorExt".into(),
                kind: ItemKind::Interface,
                doc_summary: String::new(),
                score: 520.0,
                package: "core".into(),
            },
        ];
        let output = format_search_results(&results, "Iterator");
        check!(output.contains("1. `core::iter::Iterator` (trait, core) - relevance: 100%"));
        check!(output.contains("   An interface for dealing with iterators."));
        check!(output.contains("2. `core::iter::IteratorExt` (trait, core) - relevance: 50%"));
    }
}
