//! Symbol search: index assembly, query parsing, and ranked evaluation.

pub mod engine;
pub mod index;
pub mod query;
pub mod scoring;
pub(crate) mod tokenize;

pub use engine::{DEFAULT_RESULT_CAP, QueryEngine, ScoredSymbol};
pub use index::{IndexedSymbol, PackageIndex, PackageIndexBuilder, SymbolIndex};
pub use query::{Query, QueryMode, parse};
pub use scoring::{MatchClass, ScoringWeights};
