//! Shared test fixtures and utilities for integration tests.
//!
//! # Available Fixtures
//!
//! - `rustc_utils_shard`: a real-world shard decoded from `tests/fixtures/`
//! - `loaded_state`: a [`SearchState`] with that shard and a small `core` shard registered
//! - `recorded_snapshots`: an implementor consumer that records every delivery
//!
//! [`TempWorkspace`] provides the temp directory abstraction used by config tests.

use rstest::fixture;
use rustdoc_search::shard::{RecordSpec, ShardBuilder};
use rustdoc_search::{ImplementorSnapshot, ItemKind, SearchState, ShardPayload};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Returns the project root directory (where Cargo.toml lives).
pub fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// A temporary directory that is removed on drop.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates a file, along with any missing parent directories.
    ///
    /// # Panics
    /// Panics if file creation fails.
    pub fn create_file(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent directory for '{}': {}", path, e)
            });
        }
        std::fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", path, e));
        full_path
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a shard payload from `tests/fixtures/<name>.json`.
///
/// # Panics
/// Panics if the file is missing or is not a shard payload.
#[allow(dead_code)]
pub fn load_shard(name: &str) -> ShardPayload {
    let path = project_root()
        .join("tests")
        .join("fixtures")
        .join(format!("{name}.json"));
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture '{}': {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Fixture '{}' is not a shard: {}", path.display(), e))
}

/// Builds a shard from `records`.
#[allow(dead_code)]
pub fn shard(records: &[RecordSpec<'_>]) -> ShardPayload {
    let mut builder = ShardBuilder::new();
    for record in records {
        builder.push(*record);
    }
    builder.build()
}

/// A shard of `count` structs named `Widget000`, `Widget001`, ... under `module_path`.
#[allow(dead_code)]
pub fn numbered_shard(prefix: &str, count: usize, module_path: &str) -> ShardPayload {
    let names: Vec<String> = (0..count).map(|i| format!("{prefix}{i:03}")).collect();
    let records: Vec<RecordSpec<'_>> = names
        .iter()
        .map(|name| RecordSpec::new(name, ItemKind::Struct, module_path))
        .collect();
    shard(&records)
}

/// A small `core` shard with an interface, its method, and a few slice functions.
#[allow(dead_code)]
pub fn core_shard() -> ShardPayload {
    let mut builder = ShardBuilder::new();
    let iterator = builder.push(
        RecordSpec::new("Iterator", ItemKind::Interface, "core::iter")
            .doc("An interface for dealing with iterators."),
    );
    builder.push(
        RecordSpec::new("next", ItemKind::Function, "core::iter")
            .parent(iterator)
            .signature("&mut Self -> Option<Item>")
            .doc("Advances the iterator and returns the next value."),
    );
    builder.push(
        RecordSpec::new("first", ItemKind::Function, "core::slice")
            .signature("&[T] -> Option<&T>")
            .doc("Returns the first element of the slice, or <code>None</code> if it is empty."),
    );
    builder.push(
        RecordSpec::new("len", ItemKind::Function, "core::slice")
            .signature("&[T] -> usize")
            .doc("Returns the number of elements in the slice."),
    );
    builder.build()
}

#[fixture]
pub fn rustc_utils_shard() -> ShardPayload {
    load_shard("rustc_utils-desc-0")
}

#[allow(dead_code)]
#[fixture]
pub fn loaded_state(rustc_utils_shard: ShardPayload) -> SearchState {
    let mut state = SearchState::default();
    state
        .register_shard("rustc_utils", 0, &rustc_utils_shard)
        .expect("rustc_utils fixture should register");
    state
        .register_shard("core", 0, &core_shard())
        .expect("core fixture should register");
    state
}

/// Every snapshot delivered to a consumer, in delivery order.
#[allow(dead_code)]
pub type Deliveries = Arc<Mutex<Vec<ImplementorSnapshot>>>;

#[allow(dead_code)]
#[fixture]
pub fn recorded_snapshots() -> Deliveries {
    Arc::new(Mutex::new(Vec::new()))
}

/// Paths of `state.search(query)`, in rank order.
///
/// # Panics
/// Panics if the query does not parse.
#[allow(dead_code)]
pub fn search_paths(state: &mut SearchState, query: &str) -> Vec<String> {
    state
        .search(query)
        .unwrap_or_else(|e| panic!("Query '{}' should parse: {}", query, e))
        .into_iter()
        .map(|result| result.path)
        .collect()
}
