//! Search configuration loaded from TOML.
//!
//! Every field has a default, so a missing file or an empty table is valid:
//!
//! ```toml
//! result_cap = 200
//! prune = true
//! yield_every = 4096
//! query_cache_size = 64
//!
//! [weights]
//! exact = 1000.0
//! edit_penalty = 25.0
//! ```

use crate::error::Result;
use crate::search::{DEFAULT_RESULT_CAP, QueryEngine, ScoringWeights};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RUSTDOC_SEARCH_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum number of results per query.
    pub result_cap: usize,
    /// Stop evaluating once no remaining tier can enter the results.
    pub prune: bool,
    /// Records decoded and indexed between yields on the async registration path.
    pub yield_every: usize,
    /// Number of cached query results; 0 disables the cache.
    pub query_cache_size: usize,
    pub weights: ScoringWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_cap: DEFAULT_RESULT_CAP,
            prune: true,
            yield_every: 4096,
            query_cache_size: 64,
            weights: ScoringWeights::default(),
        }
    }
}

impl SearchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse search config")
    }

    /// Load a config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config at {}", path.display()));
            }
        };

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config at {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `$RUSTDOC_SEARCH_CONFIG`, else the user config directory.
    pub async fn load_default() -> Result<Self> {
        match default_path() {
            Some(path) => Self::load(&path).await,
            None => Ok(Self::default()),
        }
    }

    /// Build the query engine these settings describe.
    pub fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.result_cap, self.weights.clone()).with_pruning(self.prune)
    }
}

/// Resolve the config path from the environment or the platform config directory.
pub fn default_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV)
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(expand_tilde(&explicit).as_ref()));
    }
    dirs::config_dir().map(|dir| dir.join("rustdoc-search").join("config.toml"))
}

/// Expands tilde (`~`) in a path to the user's home directory.
///
/// - `~/foo` becomes `/home/user/foo`
/// - `~` becomes `/home/user`
/// - Other paths are returned unchanged
pub fn expand_tilde(path: &str) -> Cow<'_, str> {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped).display().to_string());
        }
    } else if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return Cow::Owned(home.display().to_string());
    }
    Cow::Borrowed(path)
}
