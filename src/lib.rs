//! Ranked symbol search over incrementally registered rustdoc search-index shards.
//!
//! Description shards and implementor records arrive per package, in any order.
//! [`SearchState`] owns the registries and the derived [`search::SymbolIndex`], and
//! answers name, path and type-signature queries through [`search::QueryEngine`].

pub mod config;
pub mod error;
pub mod implementors;
mod markup;
pub mod schema;
pub mod search;
pub mod server;
pub mod shape;
pub mod shard;
pub mod state;
pub mod tools;
pub mod tracing;
pub mod types;

pub use config::SearchConfig;
pub use error::{AlreadyAttachedError, ParseError, RecordError, SchemaError};
pub use implementors::{
    ImplementorEntry, ImplementorPayload, ImplementorRegistry, ImplementorSnapshot,
};
pub use shard::{RegisterOutcome, ShardPayload, ShardRegistry};
pub use state::{IndexStats, SearchState};
pub use types::{ItemKind, SearchResult, Signature, SymbolEntry, TypeShape};
