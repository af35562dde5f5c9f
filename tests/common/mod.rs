//! Shared test fixtures.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{TimeZone, Utc};
use keepsake::{FixedClock, KeyRegistry, MemoryStore, RestoreCoordinator, SnapshotConfig};
use serde_json::{json, Value};

static TRACING: Once = Once::new();

/// Route library logs to the test harness. Set `RUST_LOG=keepsake=debug` to see them.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn fixed_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
}

pub fn coordinator_with(
    store: Arc<MemoryStore>,
    config: SnapshotConfig,
) -> RestoreCoordinator<Arc<MemoryStore>> {
    init_tracing();
    RestoreCoordinator::with_clock(
        store,
        Arc::new(KeyRegistry::matchday()),
        config,
        fixed_clock(),
    )
}

pub fn coordinator(store: Arc<MemoryStore>) -> RestoreCoordinator<Arc<MemoryStore>> {
    coordinator_with(store, SnapshotConfig::default())
}

pub fn saved_game() -> Value {
    json!({
        "game1": {
            "id": "game1",
            "teamName": "Test Team",
            "opponentName": "Test Opponent",
            "homeScore": 1,
            "awayScore": 0
        }
    })
}

/// A store holding a value under every MatchDay key.
pub fn state_a() -> Vec<(&'static str, Value)> {
    vec![
        ("saved-games", saved_game()),
        ("app-settings", json!({"currentGameId": "game1", "language": "en"})),
        ("seasons-list", json!([{"id": "s1", "name": "Spring 2024"}])),
        ("tournaments-list", json!([{"id": "t1", "name": "City Cup"}])),
        (
            "master-roster",
            json!([
                {"id": "p1", "name": "Alex", "jerseyNumber": "7", "isGoalie": false},
                {"id": "p2", "name": "Sam", "jerseyNumber": "1", "isGoalie": true}
            ]),
        ),
        ("last-home-team-name", json!("Test Team")),
    ]
}

/// A different value under every MatchDay key.
pub fn state_b() -> Vec<(&'static str, Value)> {
    vec![
        ("saved-games", json!({})),
        ("app-settings", json!({"currentGameId": null, "language": "fi"})),
        ("seasons-list", json!([])),
        ("tournaments-list", json!([{"id": "t9", "name": "Other Cup"}])),
        ("master-roster", json!([])),
        ("last-home-team-name", json!("Other Team")),
    ]
}
