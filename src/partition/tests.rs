//! Tests for partition routing

use super::*;
use crate::datetime::BoundedDatetime;
use crate::interpolate::Context;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

fn hash_of(slice: &StreamSlice) -> u64 {
    let mut hasher = DefaultHasher::new();
    slice.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// StreamSlice
// ============================================================================

#[test]
fn test_slice_equality_is_content_based() {
    let a = StreamSlice::new()
        .with_partition_value("account_id", "acct_1")
        .with_cursor_value("start", "2024-01-01");
    let b = StreamSlice::new()
        .with_cursor_value("start", "2024-01-01")
        .with_partition_value("account_id", "acct_1");

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));

    let c = b.clone().with_partition_value("account_id", "acct_2");
    assert_ne!(a, c);
}

#[test]
fn test_slice_dedup_in_hashset() {
    let mut set = HashSet::new();
    set.insert(StreamSlice::new().with_partition_value("id", "1"));
    set.insert(StreamSlice::new().with_partition_value("id", "1"));
    set.insert(StreamSlice::new().with_partition_value("id", "2"));
    assert_eq!(set.len(), 2);
}

#[test]
fn test_slice_id_and_lookup() {
    let slice = StreamSlice::new()
        .with_partition_value("repo", "rill")
        .with_cursor_value("start", "2024-01-01");

    assert_eq!(slice.id(), "repo=rill|start=2024-01-01");
    assert_eq!(slice.get("repo"), Some(&json!("rill")));
    assert_eq!(slice.get("start"), Some(&json!("2024-01-01")));
    assert_eq!(slice.get("missing"), None);

    assert_eq!(StreamSlice::new().id(), "_");
    assert!(StreamSlice::new().is_whole_stream());
}

#[test]
fn test_slice_to_value_flattens() {
    let slice = StreamSlice::new()
        .with_partition_value("repo", "rill")
        .with_cursor_value("start", "2024-01-01")
        .with_extra_field("region", "eu");

    assert_eq!(
        slice.to_value(),
        json!({"repo": "rill", "start": "2024-01-01", "region": "eu"})
    );
}

// ============================================================================
// Routers
// ============================================================================

#[test]
fn test_single_router() {
    let slices = SinglePartitionRouter.stream_slices().unwrap();
    assert_eq!(slices, vec![StreamSlice::new()]);
}

#[test]
fn test_list_router() {
    let router = ListPartitionRouter::new(
        vec!["us".to_string(), "eu".to_string(), "apac".to_string()],
        "region",
    );
    let slices = router.stream_slices().unwrap();
    assert_eq!(slices.len(), 3);
    assert_eq!(slices[1].get("region"), Some(&json!("eu")));
}

#[test]
fn test_substream_router_dedups_parents() {
    let parents = vec![
        json!({"id": "p1", "name": "first"}),
        json!({"id": "p2"}),
        json!({"id": "p1"}),
        json!({"no_id": true}),
    ];
    let router = SubstreamRouter::new(parents, "id", "parent_id");
    let slices = router.stream_slices().unwrap();

    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].get("parent_id"), Some(&json!("p1")));
    assert_eq!(slices[1].get("parent_id"), Some(&json!("p2")));
}

#[test]
fn test_substream_router_nested_key() {
    let parents = vec![json!({"data": {"id": 42}})];
    let router = SubstreamRouter::new(parents, "data.id", "parent_id");
    let slices = router.stream_slices().unwrap();
    assert_eq!(slices[0].get("parent_id"), Some(&json!("42")));
}

#[test]
fn test_datetime_router_windows() {
    let start = "2024-01-01T00:00:00Z".parse().unwrap();
    let end = "2024-01-04T00:00:00Z".parse().unwrap();
    let router = DatetimeRouter::new(
        start,
        end,
        chrono::Duration::days(1),
        "%Y-%m-%d",
        "start",
        "end",
    );

    let slices = router.stream_slices().unwrap();
    assert_eq!(slices.len(), 3);
    assert_eq!(slices[0].get("start"), Some(&json!("2024-01-01")));
    assert_eq!(slices[0].get("end"), Some(&json!("2024-01-02")));
    assert_eq!(slices[2].get("start"), Some(&json!("2024-01-03")));
    assert_eq!(slices[2].get("end"), Some(&json!("2024-01-04")));
}

#[test]
fn test_datetime_router_truncates_last_window() {
    let start = "2024-01-01T00:00:00Z".parse().unwrap();
    let end = "2024-01-05T00:00:00Z".parse().unwrap();
    let router = DatetimeRouter::new(
        start,
        end,
        chrono::Duration::days(3),
        "%Y-%m-%d",
        "start",
        "end",
    );

    let slices = router.stream_slices().unwrap();
    assert_eq!(slices.len(), 2);
    // Last window clamps to the end bound.
    assert_eq!(slices[1].get("start"), Some(&json!("2024-01-04")));
    assert_eq!(slices[1].get("end"), Some(&json!("2024-01-05")));
}

#[test]
fn test_datetime_router_from_bounds_clamps_with_state() {
    let mut ctx = Context::with_config(json!({"start_date": "2024-01-01"}));
    ctx.set_stream_state(json!({"updated_at": "2024-01-03"}));

    let start = BoundedDatetime::new("{{ config.start_date }}")
        .with_min("{{ stream_state.updated_at }}");
    let end = BoundedDatetime::new("2024-01-05");

    let router = DatetimeRouter::from_bounds(
        &start, &end, "1d", "%Y-%m-%d", "start", "end", &ctx,
    )
    .unwrap();
    let slices = router.stream_slices().unwrap();

    // Resumed from state: windows begin at the checkpoint, not the config start.
    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].get("start"), Some(&json!("2024-01-03")));
}

#[test]
fn test_empty_range_yields_no_slices() {
    let start = "2024-01-05T00:00:00Z".parse().unwrap();
    let end = "2024-01-01T00:00:00Z".parse().unwrap();
    let router = DatetimeRouter::new(
        start,
        end,
        chrono::Duration::days(1),
        "%Y-%m-%d",
        "start",
        "end",
    );
    assert!(router.stream_slices().unwrap().is_empty());
}

// ============================================================================
// Duration parsing
// ============================================================================

#[test]
fn test_parse_duration() {
    assert_eq!(parse_duration("1d").unwrap(), chrono::Duration::days(1));
    assert_eq!(parse_duration("2h").unwrap(), chrono::Duration::hours(2));
    assert_eq!(parse_duration("30m").unwrap(), chrono::Duration::minutes(30));
    assert_eq!(parse_duration("45s").unwrap(), chrono::Duration::seconds(45));
    assert_eq!(parse_duration("1w").unwrap(), chrono::Duration::weeks(1));
    // No suffix defaults to days.
    assert_eq!(parse_duration("7").unwrap(), chrono::Duration::days(7));

    assert!(parse_duration("abc").is_err());
    assert!(parse_duration("0d").is_err());
    assert!(parse_duration("-1d").is_err());
}
