//! Registration handlers for description shards and implementor records.

use crate::implementors::ImplementorPayload;
use crate::shard::{RegisterOutcome, ShardPayload};
use crate::state::SearchState;
use rmcp::schemars;
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterShardRequest {
    /// Package the shard belongs to, e.g. "serde"
    pub package: String,
    /// Shard number within the package
    #[serde(default)]
    pub shard_index: u32,
    /// Shard payload: {strings, names, kinds, paths, descs, parents, signatures?}
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterImplementorsRequest {
    /// Package the records come from
    pub package: String,
    /// Map of interface path to implementor records
    pub payload: serde_json::Value,
}

pub async fn handle_register_shard(
    state: &Mutex<SearchState>,
    request: RegisterShardRequest,
) -> Result<String, String> {
    let payload: ShardPayload = serde_json::from_value(request.payload)
        .map_err(|e| format!("Invalid shard payload for '{}': {}", request.package, e))?;

    let mut state = state.lock().await;
    let outcome = state
        .register_shard_yielding(&request.package, request.shard_index, &payload)
        .await
        .map_err(|e| {
            format!(
                "Rejected shard {}/{}: {}",
                request.package, request.shard_index, e
            )
        })?;

    let verb = match outcome {
        RegisterOutcome::Inserted => "Registered",
        RegisterOutcome::Replaced => "Replaced",
        RegisterOutcome::Unchanged => "Unchanged",
    };
    Ok(format!(
        "{} shard {}/{} ({} symbols). Corpus: {} symbols in {} shards.",
        verb,
        request.package,
        request.shard_index,
        payload.len(),
        state.shards().size(),
        state.shards().shard_count()
    ))
}

pub async fn handle_register_implementors(
    state: &Mutex<SearchState>,
    request: RegisterImplementorsRequest,
) -> Result<String, String> {
    let payload: ImplementorPayload = serde_json::from_value(request.payload).map_err(|e| {
        format!(
            "Invalid implementor payload for '{}': expected an object of arrays ({})",
            request.package, e
        )
    })?;

    let submitted: usize = payload.values().map(Vec::len).sum();
    let accepted = state
        .lock()
        .await
        .register_implementors(&request.package, &payload);

    let mut response = format!(
        "Accepted {} of {} implementor records from '{}'.",
        accepted, submitted, request.package
    );
    if accepted < submitted {
        response.push_str(" Malformed records were dropped.");
    }
    Ok(response)
}
