mod common;

use assert2::{check, let_assert};
use common::{
    Deliveries, TempWorkspace, core_shard, numbered_shard, recorded_snapshots, rustc_utils_shard,
    search_paths,
};
use rstest::rstest;
use rustdoc_search::shard::{RecordSpec, ShardBuilder};
use rustdoc_search::tools::register::{RegisterShardRequest, handle_register_shard};
use rustdoc_search::{
    AlreadyAttachedError, ImplementorPayload, ImplementorSnapshot, ItemKind, RegisterOutcome,
    SchemaError, SearchConfig, SearchState, ShardPayload,
};
use serde_json::json;
use tokio::sync::Mutex;

fn implementors(value: serde_json::Value) -> ImplementorPayload {
    serde_json::from_value(value).expect("implementor payload should deserialize")
}

fn recorder(deliveries: &Deliveries) -> Box<dyn FnMut(&ImplementorSnapshot) + Send> {
    let sink = deliveries.clone();
    Box::new(move |snapshot: &ImplementorSnapshot| {
        sink.lock().unwrap().push(snapshot.clone());
    })
}

// --- Description shards ---

#[rstest]
fn identical_registration_is_a_no_op(rustc_utils_shard: ShardPayload) {
    let mut state = SearchState::default();
    let_assert!(Ok(RegisterOutcome::Inserted) = state.register_shard("rustc_utils", 0, &rustc_utils_shard));
    let before = state.search("cache").unwrap();
    let size = state.shards().size();

    let_assert!(Ok(RegisterOutcome::Unchanged) = state.register_shard("rustc_utils", 0, &rustc_utils_shard));
    check!(state.shards().size() == size);
    check!(state.search("cache").unwrap() == before);
}

#[rstest]
fn reregistration_replaces_the_shard(rustc_utils_shard: ShardPayload) {
    let mut state = SearchState::default();
    state.register_shard("rustc_utils", 0, &rustc_utils_shard).unwrap();
    check!(!search_paths(&mut state, "CopyCache").is_empty());

    let replacement = numbered_shard("Cache", 2, "rustc_utils::cache");
    let_assert!(Ok(RegisterOutcome::Replaced) = state.register_shard("rustc_utils", 0, &replacement));
    check!(state.shards().size() == 2);
    check!(search_paths(&mut state, "CopyCache").is_empty());
    check!(search_paths(&mut state, "cache0") == vec![
        "rustc_utils::cache::Cache000",
        "rustc_utils::cache::Cache001",
    ]);
}

#[rstest]
fn shards_of_one_package_accumulate() {
    let mut state = SearchState::default();
    state.register_shard("gadgets", 0, &numbered_shard("Widget", 3, "gadgets")).unwrap();
    state.register_shard("gadgets", 1, &numbered_shard("Gizmo", 2, "gadgets")).unwrap();

    check!(state.shards().shard_count() == 2);
    check!(state.stats().packages == 1);
    check!(state.search("widget").unwrap().len() == 3);
    check!(state.search("gizmo").unwrap().len() == 2);
    check!(state.stats().indexed_symbols == 5);
}

#[rstest]
fn malformed_shard_leaves_registry_intact(rustc_utils_shard: ShardPayload) {
    let mut state = SearchState::default();
    state.register_shard("core", 0, &core_shard()).unwrap();
    let before = state.search("len").unwrap();

    let mut truncated = rustc_utils_shard.clone();
    truncated.kinds.pop();
    let_assert!(Err(SchemaError::LengthMismatch { column: "kinds", .. }) =
        state.register_shard("rustc_utils", 0, &truncated));

    let mut unknown_kind = rustc_utils_shard;
    unknown_kind.kinds[1] = 42;
    let_assert!(Err(SchemaError::UnknownKind { record: 1, code: 42 }) =
        state.register_shard("rustc_utils", 0, &unknown_kind));

    check!(state.shards().get("rustc_utils", 0).is_none());
    check!(state.stats().packages == 1);
    check!(state.search("len").unwrap() == before);
}

#[rstest]
fn malformed_replacement_keeps_the_previous_shard(rustc_utils_shard: ShardPayload) {
    let mut state = SearchState::default();
    state.register_shard("rustc_utils", 0, &rustc_utils_shard).unwrap();

    let mut broken = rustc_utils_shard;
    broken.parents[0] = Some(0);
    let_assert!(Err(SchemaError::ParentOutOfRange { record: 0, parent: 0 }) =
        state.register_shard("rustc_utils", 0, &broken));
    check!(!search_paths(&mut state, "CopyCache").is_empty());
}

#[rstest]
fn signatures_with_trait_bounds_register() {
    let mut builder = ShardBuilder::new();
    let lines = builder.push(RecordSpec::new("Lines", ItemKind::Struct, "text"));
    builder.push(
        RecordSpec::new("iter", ItemKind::Function, "text")
            .parent(lines)
            .signature("&Self -> impl Iterator<Item = T> + '_"),
    );
    builder.push(
        RecordSpec::new("report", ItemKind::Function, "text").signature("Box<dyn Error + Send> -> u8"),
    );

    let mut state = SearchState::default();
    let_assert!(Ok(RegisterOutcome::Inserted) = state.register_shard("text", 0, &builder.build()));
    check!(search_paths(&mut state, "Lines") == vec!["text::Lines"]);
    check!(search_paths(&mut state, "Box<dyn Error + Send> -> u8") == vec!["text::report"]);
    let iterators = search_paths(&mut state, "-> impl Iterator<Item = T> + Send");
    check!(iterators.contains(&"text::Lines::iter".to_string()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn chunked_registration_is_searchable_immediately(rustc_utils_shard: ShardPayload) {
    let mut state = SearchState::new(SearchConfig {
        yield_every: 4,
        ..SearchConfig::default()
    });
    let_assert!(Ok(RegisterOutcome::Inserted) =
        state.register_shard_yielding("rustc_utils", 0, &rustc_utils_shard).await);
    check!(!state.shards().is_dirty());
    check!(state.stats().indexed_symbols == rustc_utils_shard.len());

    let mut reference = SearchState::default();
    reference.register_shard("rustc_utils", 0, &rustc_utils_shard).unwrap();
    for query in ["cache", "rustc_utils::hir::", "&Ty, &TyCtxt -> bool"] {
        check!(state.search(query).unwrap() == reference.search(query).unwrap());
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn register_tool_accepts_fixture_json() {
    let fixture = std::fs::read_to_string(
        common::project_root().join("tests/fixtures/rustc_utils-desc-0.json"),
    )
    .unwrap();
    let state = Mutex::new(SearchState::default());
    let request = RegisterShardRequest {
        package: "rustc_utils".to_string(),
        shard_index: 0,
        payload: serde_json::from_str(&fixture).unwrap(),
    };

    let_assert!(Ok(message) = handle_register_shard(&state, request).await);
    check!(message.starts_with("Registered shard rustc_utils/0 (14 symbols)"));
}

// --- Implementors ---

#[rstest]
fn records_registered_before_attach_are_delivered_on_attach(recorded_snapshots: Deliveries) {
    let mut state = SearchState::default();
    state.register_implementors(
        "rustc_utils",
        &implementors(json!({
            "BodyExt": ["impl&lt;'tcx&gt; <a>BodyExt</a>&lt;'tcx&gt; for <a>Body</a>&lt;'tcx&gt;"],
        })),
    );
    state.register_implementors(
        "flowistry",
        &implementors(json!({
            "BodyExt": [{"type": "FlowBody<'tcx>", "where": ["'tcx: 'static"]}],
        })),
    );
    check!(recorded_snapshots.lock().unwrap().is_empty());

    state
        .attach_implementor_consumer(recorder(&recorded_snapshots))
        .unwrap();

    let deliveries = recorded_snapshots.lock().unwrap();
    let_assert!([snapshot] = deliveries.as_slice());
    let entries = &snapshot["BodyExt"];
    check!(entries.len() == 2);
    check!(entries[0].implementing_type_text == "Body<'tcx>");
    check!(entries[0].source_package == "rustc_utils");
    check!(entries[1].implementing_type_text == "FlowBody<'tcx>");
    check!(entries[1].generic_constraints == vec!["'tcx: 'static"]);
}

#[rstest]
fn snapshots_merge_packages_in_registration_order(recorded_snapshots: Deliveries) {
    let mut state = SearchState::default();
    state.register_implementors("smallvec", &implementors(json!({"Iterator": ["impl Iterator for IntoIter"]})));
    state.register_implementors("syn", &implementors(json!({"Iterator": ["impl Iterator for Iter"]})));
    state
        .attach_implementor_consumer(recorder(&recorded_snapshots))
        .unwrap();
    state.register_implementors("anyhow", &implementors(json!({"Iterator": ["impl Iterator for Chain"]})));

    let deliveries = recorded_snapshots.lock().unwrap();
    let owners = |snapshot: &ImplementorSnapshot| -> Vec<String> {
        snapshot["Iterator"]
            .iter()
            .map(|entry| format!("{}:{}", entry.source_package, entry.implementing_type_text))
            .collect()
    };
    check!(deliveries.len() == 2);
    check!(owners(&deliveries[0]) == vec!["smallvec:IntoIter", "syn:Iter"]);
    check!(owners(&deliveries[1]) == vec!["smallvec:IntoIter", "syn:Iter", "anyhow:Chain"]);
}

#[rstest]
fn attach_with_nothing_buffered_delivers_nothing(recorded_snapshots: Deliveries) {
    let mut state = SearchState::default();
    state
        .attach_implementor_consumer(recorder(&recorded_snapshots))
        .unwrap();
    check!(recorded_snapshots.lock().unwrap().is_empty());

    state.register_implementors("rustc_utils", &implementors(json!({"TyExt": ["impl TyExt for Ty"]})));
    check!(recorded_snapshots.lock().unwrap().len() == 1);
}

#[rstest]
fn package_reregistration_overwrites_its_slot(recorded_snapshots: Deliveries) {
    let mut state = SearchState::default();
    state
        .attach_implementor_consumer(recorder(&recorded_snapshots))
        .unwrap();

    state.register_implementors("alpha", &implementors(json!({"Iterator": ["impl Iterator for A"]})));
    state.register_implementors("beta", &implementors(json!({"Iterator": ["impl Iterator for B"]})));
    state.register_implementors(
        "alpha",
        &implementors(json!({"Iterator": ["impl Iterator for A2", "impl Iterator for A3"]})),
    );

    let deliveries = recorded_snapshots.lock().unwrap();
    check!(deliveries.len() == 3);
    let types: Vec<&str> = deliveries[2]["Iterator"]
        .iter()
        .map(|entry| entry.implementing_type_text.as_str())
        .collect();
    check!(types == vec!["A2", "A3", "B"]);
}

#[rstest]
fn empty_reregistration_drops_the_package_slot(recorded_snapshots: Deliveries) {
    let mut state = SearchState::default();
    state.register_implementors("alpha", &implementors(json!({"Iterator": ["impl Iterator for A"]})));
    state.register_implementors("alpha", &implementors(json!({"Iterator": []})));
    check!(state.implementors().is_empty());

    state
        .attach_implementor_consumer(recorder(&recorded_snapshots))
        .unwrap();
    check!(recorded_snapshots.lock().unwrap().is_empty());

    state.register_implementors("beta", &implementors(json!({"Iterator": ["impl Iterator for B"]})));
    let deliveries = recorded_snapshots.lock().unwrap();
    let_assert!([snapshot] = deliveries.as_slice());
    check!(snapshot["Iterator"].len() == 1);
    check!(snapshot["Iterator"][0].source_package == "beta");
}

#[rstest]
fn second_attach_is_rejected(recorded_snapshots: Deliveries) {
    let mut state = SearchState::default();
    state
        .attach_implementor_consumer(recorder(&recorded_snapshots))
        .unwrap();

    let intruder: Deliveries = Default::default();
    let_assert!(Err(AlreadyAttachedError) = state.attach_implementor_consumer(recorder(&intruder)));

    state.register_implementors("rustc_utils", &implementors(json!({"TyExt": ["impl TyExt for Ty"]})));
    check!(recorded_snapshots.lock().unwrap().len() == 1);
    check!(intruder.lock().unwrap().is_empty());
}

#[rstest]
fn malformed_implementor_records_are_dropped_individually(recorded_snapshots: Deliveries) {
    let mut state = SearchState::default();
    state
        .attach_implementor_consumer(recorder(&recorded_snapshots))
        .unwrap();

    let accepted = state.register_implementors(
        "rustc_utils",
        &implementors(json!({
            "TyExt": ["impl TyExt for Ty", 17, "impl TyExt", {"type": "Ty<'tcx>"}],
        })),
    );
    check!(accepted == 2);
    check!(state.implementors().implementors_of("TyExt").len() == 2);
}

// --- Configuration ---

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn config_file_drives_the_engine() {
    let workspace = TempWorkspace::new();
    let path = workspace.create_file(
        "rustdoc-search/config.toml",
        r#"
result_cap = 2
query_cache_size = 0

[weights]
exact = 2000.0
"#,
    );

    let_assert!(Ok(config) = SearchConfig::load(&path).await);
    check!(config.result_cap == 2);
    check!(config.prune);
    check!(config.weights.exact == 2000.0);

    let mut state = SearchState::new(config);
    state.register_shard("gadgets", 0, &numbered_shard("Widget", 5, "gadgets")).unwrap();
    check!(state.search("widget").unwrap().len() == 2);
    check!(state.stats().cached_queries == 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_config_falls_back_to_defaults() {
    let workspace = TempWorkspace::new();
    let_assert!(Ok(config) = SearchConfig::load(&workspace.path().join("absent.toml")).await);
    check!(config == SearchConfig::default());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_config_keys_are_rejected() {
    let workspace = TempWorkspace::new();
    let path = workspace.create_file("config.toml", "result_limit = 5\n");
    let_assert!(Err(err) = SearchConfig::load(&path).await);
    check!(format!("{err:#}").contains("result_limit"));
}
