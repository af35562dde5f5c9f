//! Backup and Restore Tests
//!
//! Export/restore behaviour against an in-memory store: the user-facing
//! backup scenarios plus round trip, non-mutation and idempotence checks.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use keepsake::{
    DecodeError, MemoryStore, MissingEntryPolicy, RestoreError, RestorePhase, SnapshotConfig,
    Store, UnknownFieldPolicy,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

use common::{coordinator, coordinator_with, saved_game, state_a, state_b};

fn seed(store: &MemoryStore, state: &[(&str, Value)]) {
    for (key, value) in state {
        store.set(key, value).unwrap();
    }
}

fn expected_map(state: &[(&str, Value)]) -> BTreeMap<String, Value> {
    state
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// === Export ===

#[test]
fn test_export_carries_saved_games() {
    let store = Arc::new(MemoryStore::from_entries([("saved-games", saved_game())]));
    let blob = coordinator(store).export().unwrap();

    let parsed: Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(parsed["localStorage"]["savedSoccerGames"], saved_game());
    assert_eq!(parsed["meta"]["schema"], json!(1));
}

#[test]
fn test_export_does_not_mutate_store() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &state_a());
    let before = store.to_map();

    coordinator(store.clone()).export().unwrap();

    assert_eq!(store.to_map(), before);
}

#[test]
fn test_export_is_fresh_each_call() {
    let store = Arc::new(MemoryStore::from_entries([("last-home-team-name", json!("One"))]));
    let coordinator = coordinator(store.clone());

    let first = coordinator.export().unwrap();
    store.set("last-home-team-name", &json!("Two")).unwrap();
    let second = coordinator.export().unwrap();

    assert!(first.contains("\"One\""));
    assert!(second.contains("\"Two\""));
}

// === Rejected restores ===

#[test_case("This is just a text file, not JSON.", "MALFORMED" ; "plain text")]
#[test_case("{\"meta\": {\"schema\": 1}", "MALFORMED" ; "truncated json")]
#[test_case(r#"{"localStorage":{"savedSoccerGames":{"game1":{"id":"game1"}}}}"#, "MISSING_META" ; "no meta")]
#[test_case(r#"{"meta":{},"localStorage":{}}"#, "MISSING_META" ; "meta without schema")]
#[test_case(r#""just a json string""#, "MISSING_META" ; "json string root")]
#[test_case(r#"{"meta":{"schema":99,"exportedAt":"2023-01-01T00:00:00Z"},"localStorage":{}}"#, "UNSUPPORTED_SCHEMA" ; "future schema")]
#[test_case(r#"{"meta":{"schema":1}}"#, "MISSING_ENTRIES" ; "no entries")]
#[test_case(r#"{"meta":{"schema":1},"localStorage":"savedSoccerGames"}"#, "MISSING_ENTRIES" ; "entries not an object")]
fn test_rejected_restore_leaves_store_untouched(blob: &str, expected_code: &str) {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &state_a());
    let before = store.to_map();
    let coordinator = coordinator(store.clone());

    let err = coordinator.restore(blob).unwrap_err();

    assert_eq!(err.error_code(), expected_code);
    assert!(err.is_retryable());
    assert_eq!(coordinator.phase(), RestorePhase::Rejected);
    assert_eq!(store.to_map(), before);
}

#[test_case(json!(0) ; "zero")]
#[test_case(json!(2) ; "next version")]
#[test_case(json!(99) ; "far future")]
#[test_case(json!(-1) ; "negative")]
#[test_case(json!(1.5) ; "fractional")]
#[test_case(json!("1") ; "string one")]
#[test_case(json!(null) ; "null")]
fn test_only_current_schema_is_accepted(schema: Value) {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator(store.clone());

    // Payload is otherwise perfectly valid.
    let blob = json!({
        "meta": {"schema": schema.clone(), "exportedAt": "2023-01-01T00:00:00Z"},
        "localStorage": {"savedSoccerGames": saved_game()},
    })
    .to_string();

    match coordinator.restore(&blob).unwrap_err() {
        RestoreError::Decode(DecodeError::UnsupportedSchema { found }) => assert_eq!(found, schema),
        other => panic!("Expected UnsupportedSchema, got {:?}", other),
    }
    assert!(store.is_empty());
}

#[test]
fn test_oversized_backup_rejected_before_parsing() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &state_a());
    let before = store.to_map();
    let coordinator = coordinator_with(
        store.clone(),
        SnapshotConfig::default().with_max_blob_bytes(64),
    );

    // Not even JSON, but the size check comes first.
    let blob = "x".repeat(65);
    let err = coordinator.restore(&blob).unwrap_err();

    assert_eq!(err.error_code(), "TOO_LARGE");
    assert_eq!(store.to_map(), before);
}

// === Successful restores ===

#[test]
fn test_restore_replaces_state_b_with_state_a() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &state_a());
    let coordinator = coordinator(store.clone());

    let backup = coordinator.create_backup().unwrap();
    seed(&store, &state_b());
    assert_eq!(store.to_map(), expected_map(&state_b()));

    let summary = coordinator.restore_from_backup(&backup).unwrap();

    assert_eq!(store.to_map(), expected_map(&state_a()));
    assert_eq!(summary.restored_keys.len(), 6);
    assert!(summary.cleared_keys.is_empty());
    assert!(summary.skipped_keys.is_empty());
    assert_eq!(coordinator.phase(), RestorePhase::Applied);
}

#[test_case(vec![] ; "empty store")]
#[test_case(vec![("saved-games", saved_game())] ; "single key")]
#[test_case(state_a() ; "every key")]
#[test_case(vec![("app-settings", json!(false)), ("last-home-team-name", json!(""))] ; "falsy values")]
#[test_case(vec![("seasons-list", json!([[1, [2, [3]]], {"deep": {"deeper": {"deepest": null}}}]))] ; "nested values")]
#[test_case(vec![("app-settings", Value::Null), ("saved-games", json!({}))] ; "explicit null")]
fn test_round_trip_into_cleared_store(state: Vec<(&'static str, Value)>) {
    let source = Arc::new(MemoryStore::new());
    seed(&source, &state);
    let backup = coordinator(source.clone()).export().unwrap();

    // Fresh store of the same shape, pre-filled so absent keys must be cleared.
    let target = Arc::new(MemoryStore::new());
    seed(&target, &state_b());
    coordinator(target.clone()).restore(&backup).unwrap();

    assert_eq!(target.to_map(), source.to_map());
}

#[test]
fn test_restore_is_idempotent() {
    let source = Arc::new(MemoryStore::new());
    seed(&source, &state_a());
    let backup = coordinator(source).export().unwrap();

    let target = Arc::new(MemoryStore::new());
    seed(&target, &state_b());
    let coordinator = coordinator(target.clone());

    let first = coordinator.restore(&backup).unwrap();
    let after_once = target.to_map();
    let second = coordinator.restore(&backup).unwrap();

    assert_eq!(target.to_map(), after_once);
    assert_eq!(first, second);
}

#[test]
fn test_restore_ignores_unknown_fields_by_default() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator(store.clone());

    let blob = json!({
        "meta": {"schema": 1, "exportedAt": "2023-01-01T00:00:00.000Z"},
        "localStorage": {
            "savedSoccerGames": saved_game(),
            "soccerTimerState": {"elapsed": 120},
        }
    })
    .to_string();

    let summary = coordinator.restore(&blob).unwrap();

    assert_eq!(summary.ignored_fields, vec!["soccerTimerState".to_string()]);
    assert_eq!(store.get("saved-games").unwrap(), Some(saved_game()));
    assert_eq!(store.get("soccerTimerState").unwrap(), None);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_strict_mode_rejects_unknown_fields_without_writing() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &state_b());
    let before = store.to_map();
    let coordinator = coordinator_with(
        store.clone(),
        SnapshotConfig::default().with_unknown_fields(UnknownFieldPolicy::Reject),
    );

    let blob = json!({
        "meta": {"schema": 1},
        "localStorage": {
            "savedSoccerGames": saved_game(),
            "soccerTimerState": {"elapsed": 120},
        }
    })
    .to_string();

    let err = coordinator.restore(&blob).unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_FIELD");
    assert_eq!(store.to_map(), before);
}

#[test]
fn test_partial_backup_leaves_missing_keys_untouched() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &state_b());
    let coordinator = coordinator(store.clone());

    let blob = json!({
        "meta": {"schema": 1},
        "localStorage": {"savedSoccerGames": saved_game()},
    })
    .to_string();

    let summary = coordinator.restore(&blob).unwrap();

    assert_eq!(summary.restored_keys, vec!["saved-games".to_string()]);
    assert_eq!(summary.skipped_keys.len(), 5);
    assert_eq!(store.get("saved-games").unwrap(), Some(saved_game()));
    assert_eq!(
        store.get("last-home-team-name").unwrap(),
        Some(json!("Other Team"))
    );
}

#[test]
fn test_partial_backup_clears_missing_keys_when_configured() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &state_b());
    let coordinator = coordinator_with(
        store.clone(),
        SnapshotConfig::default().with_missing_entries(MissingEntryPolicy::Clear),
    );

    let blob = json!({
        "meta": {"schema": 1},
        "localStorage": {"savedSoccerGames": saved_game()},
    })
    .to_string();

    let summary = coordinator.restore(&blob).unwrap();

    assert_eq!(summary.cleared_keys.len(), 5);
    assert!(summary.skipped_keys.is_empty());
    assert_eq!(
        store.to_map(),
        expected_map(&[("saved-games", saved_game())])
    );
}

#[test]
fn test_quota_failure_is_reported_as_partial_write() {
    let source = Arc::new(MemoryStore::new());
    seed(&source, &state_a());
    let backup = coordinator(source).export().unwrap();

    // Enough room for the saved games only.
    let target = Arc::new(MemoryStore::with_quota(150));
    let coordinator = coordinator(target.clone());

    match coordinator.restore(&backup).unwrap_err() {
        err @ RestoreError::PartialWriteFailure { .. } => {
            assert!(!err.is_retryable());
            if let RestoreError::PartialWriteFailure {
                failed_key,
                applied_keys,
                ..
            } = err
            {
                assert_eq!(applied_keys, vec!["saved-games".to_string()]);
                assert_eq!(failed_key, "app-settings");
            }
        }
        other => panic!("Expected PartialWriteFailure, got {:?}", other),
    }

    assert_eq!(coordinator.phase(), RestorePhase::PartiallyApplied);
    assert_eq!(target.get("saved-games").unwrap(), Some(saved_game()));
}

#[test]
fn test_summary_reports_backup_time() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = coordinator(store);

    let backup = coordinator.export().unwrap();
    let summary = coordinator.restore(&backup).unwrap();

    assert_eq!(summary.exported_at, Some(common::fixed_clock().0));
    // Every key was absent, so every key was cleared.
    assert_eq!(summary.cleared_keys.len(), 6);
}
