use rmcp::{ServiceExt, transport::stdio};
use rustdoc_search::{SearchConfig, server::SearchServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stderr only: stdout carries the MCP protocol
    rustdoc_search::tracing::init();

    let config = SearchConfig::load_default().await.inspect_err(|e| {
        tracing::error!("Failed to load config: {:?}", e);
    })?;
    tracing::info!(
        "Starting rustdoc-search MCP server (result cap {}, cache {})",
        config.result_cap,
        config.query_cache_size
    );

    let server = SearchServer::new(config);
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("Error serving MCP server: {:?}", e);
    })?;

    service.waiting().await?;

    Ok(())
}
