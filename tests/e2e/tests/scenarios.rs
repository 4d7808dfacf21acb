//! End-to-end scenario tests spanning multiple modules, one per concrete
//! example from the spec's testable-properties section: semantic recall
//! ranking, proactive contradiction detection, version-update
//! auto-resolution, spreading-activation hub inhibition, heartbeat crash
//! detection, and cron next-run search.

use chrono::{Datelike, Duration, Local, TimeZone, Timelike, Utc};
use just_memory_core::contradiction::ContradictionKind;
use just_memory_core::graph::Direction;
use just_memory_core::memory::MemoryType;
use just_memory_core::scheduler::next_cron_occurrence;
use just_memory_core::search::{spreading_activation, SpreadingActivationConfig};
use just_memory_core::session::new_session_id;
use just_memory_core::storage::Storage;
use just_memory_e2e::harness::orchestration::store_with_contradiction_check;

/// Scenario 2 — proactive contradiction: storing a second, conflicting fact
/// surfaces the first memory as a factual contradiction, records a
/// `contradiction_factual` edge, and bumps both `contradiction_count`s.
#[test]
fn proactive_contradiction_on_conflicting_port_facts() {
    let storage = Storage::open_in_memory().unwrap();
    let (first, _) = store_with_contradiction_check(&storage, "The project default port is 3000", MemoryType::Fact, "p1").unwrap();
    let (second, found) = store_with_contradiction_check(&storage, "The project default port is 8080", MemoryType::Fact, "p1").unwrap();

    assert!(found.iter().any(|c| c.other_memory_id == first.id && c.kind == ContradictionKind::Factual));

    let edges = storage.edge_query(&second.id, Direction::Both, "p1", false).unwrap();
    assert!(edges.iter().any(|e| e.relation_type == "contradiction_factual"));

    let first_after = storage.get_memory_row(&first.id).unwrap().unwrap();
    let second_after = storage.get_memory_row(&second.id).unwrap().unwrap();
    assert!(first_after.contradiction_count >= 1);
    assert!(second_after.contradiction_count >= 1);
}

/// Scenario 3 — version-update false positive auto-resolution: two memories
/// differing only in a version token and otherwise sharing content get
/// auto-resolved `keep_both` with a "version update" note, and neither is
/// soft-deleted.
#[test]
fn version_update_auto_resolves_as_keep_both() {
    let storage = Storage::open_in_memory().unwrap();
    let (_first, _) = store_with_contradiction_check(
        &storage,
        "Just-Memory v4.2 uses SQLite backend with embedding support",
        MemoryType::Fact,
        "p1",
    )
    .unwrap();
    let (_second, found) = store_with_contradiction_check(
        &storage,
        "Just-Memory v4.3 uses SQLite backend with embedding support",
        MemoryType::Fact,
        "p1",
    )
    .unwrap();
    assert!(!found.is_empty(), "expected a contradiction signal between the two version strings");

    let resolved_ids = storage.contradiction_auto_resolve("p1").unwrap();
    assert!(!resolved_ids.is_empty());

    for id in resolved_ids {
        let record = storage.contradiction_get(&id).unwrap().unwrap();
        assert_eq!(record.kind.as_deref(), Some("keep_both"));
        assert!(record.note.as_deref().unwrap_or("").contains("version update"));

        let m1 = storage.get_memory_row(&record.memory_id_1).unwrap().unwrap();
        let m2 = storage.get_memory_row(&record.memory_id_2).unwrap().unwrap();
        assert!(m1.deleted_at.is_none());
        assert!(m2.deleted_at.is_none());
    }
}

/// Scenario 4 — spreading activation hub inhibition: a star graph (one hub,
/// 20 leaves, equal-confidence edges) activated from a single leaf should
/// give the hub `0.5` activation and every other leaf a tiny fraction of
/// that, so the hub never swamps a leaf-level result set.
#[test]
fn spreading_activation_hub_does_not_swamp_leaves() {
    let storage = Storage::open_in_memory().unwrap();
    let store_one = |content: &str| store_with_contradiction_check(&storage, content, MemoryType::Note, "p1").unwrap().0;

    let hub = store_one("hub memory");
    let leaves: Vec<_> = (0..20).map(|i| store_one(&format!("leaf memory {i}"))).collect();

    for leaf in &leaves {
        storage.edge_create(&leaf.id, &hub.id, "related_to", 1.0, serde_json::Value::Null, "p1").unwrap();
    }

    let config = SpreadingActivationConfig { max_hops: 2, decay: 0.5, lateral_inhibition_cap: 1.0, min_activation: 0.0001 };
    let result = spreading_activation(&storage, "p1", &[leaves[0].id.clone()], config).unwrap();

    let hub_activation = result.activations.get(&hub.id).copied().unwrap_or(0.0);
    assert!((hub_activation - 0.5).abs() < 1e-9, "hub activation was {hub_activation}");

    for other_leaf in &leaves[1..] {
        let activation = result.activations.get(&other_leaf.id).copied().unwrap_or(0.0);
        assert!(activation <= 0.0125 + 1e-9, "leaf {} got {activation}, expected <= ~0.0125", other_leaf.id);
    }
}

/// Scenario 5 — crash detection: a stale heartbeat from a different session
/// id reports `crashed = true` with the original timestamp.
#[test]
fn stale_heartbeat_from_other_session_reports_crash() {
    let storage = Storage::open_in_memory().unwrap();
    let old_session = "OLD";
    let stale_timestamp = Utc::now() - Duration::minutes(5);

    storage
        .with_write(|conn| {
            conn.execute(
                "INSERT INTO scratchpad (key, project_id, value, expires_at, updated_at)
                 VALUES ('_jm_last_heartbeat', 'p1', ?1, NULL, ?1)",
                rusqlite::params![serde_json::json!({"session_id": old_session, "timestamp": stale_timestamp}).to_string()],
            )?;
            Ok(())
        })
        .unwrap();

    let new_session = new_session_id();
    assert_ne!(new_session, old_session);

    let crash_state = storage.check_crash("p1", &new_session).unwrap();
    assert!(crash_state.crashed);
    assert_eq!(crash_state.last_heartbeat.unwrap().timestamp(), stale_timestamp.timestamp());
}

/// Scenario 6 — cron next-run search, matched in **local** time: a
/// daily-9am schedule queried at 10:30 local rolls to 9:00 local the next
/// day, and a Feb-29 schedule correctly finds the next leap year.
#[test]
fn cron_next_occurrence_matches_literal_examples() {
    let from_local = Local.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap();
    let from = from_local.with_timezone(&Utc);
    let next = next_cron_occurrence("0 9 * * *", from).unwrap().with_timezone(&Local);
    assert_eq!(next.date_naive(), from_local.date_naive() + Duration::days(1));
    assert_eq!(next.hour(), 9);
    assert_eq!(next.minute(), 0);

    let from_leap_local = Local.with_ymd_and_hms(2027, 12, 1, 0, 0, 0).unwrap();
    let from_leap = from_leap_local.with_timezone(&Utc);
    let next_leap = next_cron_occurrence("0 0 29 2 *", from_leap).unwrap().with_timezone(&Local);
    assert_eq!(next_leap.year(), 2028);
    assert_eq!(next_leap.month(), 2);
    assert_eq!(next_leap.day(), 29);
    assert_eq!(next_leap.hour(), 0);
    assert_eq!(next_leap.minute(), 0);
}

/// Scenario 1 (keyword variant) — `search_keyword`'s best match for a query
/// ranks the on-topic memory above an unrelated distractor. The literal
/// semantic-embedding version of this scenario needs a real embedder model
/// and isn't exercised here (see [`Storage::knn_exact`] unit tests instead).
#[test]
fn keyword_search_ranks_on_topic_memory_first() {
    let storage = Storage::open_in_memory().unwrap();
    store_with_contradiction_check(&storage, "TypeScript adds static type checking to JavaScript", MemoryType::Fact, "p1").unwrap();
    store_with_contradiction_check(&storage, "Chocolate cake requires cocoa powder and eggs", MemoryType::Procedure, "p1").unwrap();

    let hits = storage.search_keyword("p1", "typescript typed language", 3, None).unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].memory.content.contains("TypeScript"));
}
