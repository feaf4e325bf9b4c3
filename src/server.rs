//! MCP server exposing registration and search as tools.

use crate::config::SearchConfig;
use crate::implementors::ImplementorSnapshot;
use crate::schema::inline_schema_for_type;
use crate::state::SearchState;
use crate::tools::implementors::{
    ListImplementorsRequest, handle_index_stats, handle_list_implementors,
};
use crate::tools::register::{
    RegisterImplementorsRequest, RegisterShardRequest, handle_register_implementors,
    handle_register_shard,
};
use crate::tools::search::{SearchRequest, handle_search};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use std::sync::{Arc, PoisonError};

/// MCP Server for documentation symbol search
#[derive(Clone)]
pub struct SearchServer {
    /// Registries, index and engine
    state: Arc<tokio::sync::Mutex<SearchState>>,

    /// Last snapshot pushed to the implementor consumer
    implementors: Arc<std::sync::Mutex<ImplementorSnapshot>>,

    /// Tool router for handling MCP tool calls
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for SearchServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchServer")
            .field("state", &self.state)
            .finish()
    }
}

#[tool_router]
impl SearchServer {
    /// Create a server and attach it as the single implementor consumer.
    pub fn new(config: SearchConfig) -> Self {
        let implementors = Arc::new(std::sync::Mutex::new(ImplementorSnapshot::new()));
        let sink = Arc::clone(&implementors);

        let mut state = SearchState::new(config);
        let attached = state.attach_implementor_consumer(Box::new(
            move |snapshot: &ImplementorSnapshot| {
                // Deliveries are full snapshots.
                let mut latest = sink.lock().unwrap_or_else(PoisonError::into_inner);
                *latest = snapshot.clone();
            },
        ));
        if let Err(e) = attached {
            tracing::warn!("rustdoc-search: {}", e);
        }

        Self {
            state: Arc::new(tokio::sync::Mutex::new(state)),
            implementors,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the shared state.
    pub fn state(&self) -> &Arc<tokio::sync::Mutex<SearchState>> {
        &self.state
    }

    #[tool(
        description = "Register one description shard for a package. Re-registering the same package and shard index replaces it; identical payloads are ignored. Malformed shards are rejected without affecting other shards.",
        input_schema = inline_schema_for_type::<RegisterShardRequest>()
    )]
    async fn register_shard(
        &self,
        Parameters(request): Parameters<RegisterShardRequest>,
    ) -> std::result::Result<String, String> {
        handle_register_shard(&self.state, request).await
    }

    #[tool(
        description = "Register interface implementor records for a package, as a map from interface path to records. Records may be rendered impl headers or {type, where, package} objects. Malformed records are dropped individually.",
        input_schema = inline_schema_for_type::<RegisterImplementorsRequest>()
    )]
    async fn register_implementors(
        &self,
        Parameters(request): Parameters<RegisterImplementorsRequest>,
    ) -> std::result::Result<String, String> {
        handle_register_implementors(&self.state, request).await
    }

    #[tool(
        description = "Search registered symbols. Accepts names with typo tolerance ('Iterator', 'itertor'), paths ('std::vec::Vec', 'core::iter::' for children), or type signatures ('Vec<T> -> Option<T>'). Prefix with a kind such as 'fn:' or 'trait:' to filter.",
        input_schema = inline_schema_for_type::<SearchRequest>()
    )]
    async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> std::result::Result<String, String> {
        handle_search(&self.state, request).await
    }

    #[tool(
        description = "List the registered implementors of an interface, or the interfaces that have implementors when no interface is given.",
        input_schema = inline_schema_for_type::<ListImplementorsRequest>()
    )]
    async fn list_implementors(
        &self,
        Parameters(request): Parameters<ListImplementorsRequest>,
    ) -> std::result::Result<String, String> {
        let snapshot = self
            .implementors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        handle_list_implementors(&snapshot, request)
    }

    #[tool(description = "Show counts of registered packages, shards, symbols and implementors.")]
    async fn index_stats(&self) -> std::result::Result<String, String> {
        let state = self.state.lock().await;
        handle_index_stats(&state)
    }
}

#[tool_handler]
impl ServerHandler for SearchServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = Implementation::from_build_env();
        info.instructions = Some(
            "rustdoc-search: ranked search over rustdoc search-index shards. \
             Register shards with register_shard and implementor records with \
             register_implementors, then query with search."
                .to_string(),
        );
        info
    }
}
