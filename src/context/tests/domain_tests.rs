//! Tests for context identifiers and sync event wire format.

use chrono::{TimeZone, Utc};
use rstest::rstest;
use serde_json::json;

use crate::context::domain::{
    BranchId, ContextEntry, ContextId, ContextSyncEvent, SyncEventType,
};
use crate::test_support::ManualClock;

#[rstest]
fn branch_ids_join_source_target_and_millis() {
    let created_at = Utc
        .timestamp_millis_opt(1_767_258_000_123)
        .single()
        .expect("valid timestamp");

    let id = BranchId::derive(&ContextId::new("plan"), &ContextId::new("coder"), created_at);

    assert_eq!(id.as_str(), "plan-coder-1767258000123");
    assert_eq!(id.as_context_id(), ContextId::new("plan-coder-1767258000123"));
}

#[rstest]
fn update_event_serialises_without_origin() {
    let clock = ManualClock::new();
    let event = ContextSyncEvent::update(
        "planner",
        "plan",
        vec![ContextEntry::new(json!({"step": 1}))],
        &clock,
    )
    .with_metadata("reason", "checkpoint");

    let value = serde_json::to_value(&event).expect("event should serialise");

    assert_eq!(value["type"], json!("update"));
    assert_eq!(value["agentId"], json!("planner"));
    assert_eq!(value["contextId"], json!("plan"));
    assert_eq!(value["nodes"], json!([{"step": 1}]));
    assert_eq!(value["metadata"]["reason"], json!("checkpoint"));
    assert!(value.get("origin").is_none());
}

#[rstest]
#[case("update", SyncEventType::Update)]
#[case("delete", SyncEventType::Delete)]
#[case("prune", SyncEventType::Prune)]
fn minimal_events_parse_with_defaults(#[case] kind: &str, #[case] expected: SyncEventType) {
    let event: ContextSyncEvent = serde_json::from_value(json!({
        "type": kind,
        "agentId": "a",
        "contextId": "c",
        "timestamp": "2026-01-01T09:00:00Z"
    }))
    .expect("event should parse");

    assert_eq!(event.kind(), expected);
    assert!(event.nodes().is_empty());
    assert!(event.metadata().is_empty());
    assert_eq!(event.origin(), None);
}

#[rstest]
fn delete_and_prune_events_carry_no_entries() {
    let clock = ManualClock::new();

    let delete = ContextSyncEvent::delete("a", "c", &clock);
    let prune = ContextSyncEvent::prune("a", "c", &clock);

    assert_eq!(delete.kind(), SyncEventType::Delete);
    assert_eq!(prune.kind(), SyncEventType::Prune);
    assert!(delete.nodes().is_empty() && prune.nodes().is_empty());
}
