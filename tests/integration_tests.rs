//! Integration tests using a mock HTTP server
//!
//! Exercise the full flow: YAML stream definition → HTTP requests →
//! classified responses → extracted records → checkpointed state.

use rill_cdk::config::StreamDefinition;
use rill_cdk::engine::SyncConfig;
use rill_cdk::error::Error;
use rill_cdk::handler::{DefaultErrorHandler, FailureType, ResponseAction, ResponseFilter};
use rill_cdk::pagination::CursorPaginator;
use rill_cdk::requester::{HttpTransport, PaginatedRequester, RetryPolicy, Transport};
use rill_cdk::state::StateManager;
use rill_cdk::types::Record;

use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn transport() -> Arc<dyn Transport> {
    // RUST_LOG=rill_cdk=debug surfaces retry/backoff decisions while
    // debugging a failing scenario.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    Arc::new(HttpTransport::new())
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        max_elapsed: None,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
    }
}

// ============================================================================
// Pagination end-to-end
// ============================================================================

/// Serves page 1 (2 records + token "a") until the cursor arrives, then
/// page 2 (1 record, no token).
struct TwoPageApi;

impl Respond for TwoPageApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let has_cursor = request
            .url
            .query_pairs()
            .any(|(k, v)| k == "cursor" && v == "a");
        if has_cursor {
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 3}]}))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 1}, {"id": 2}],
                "next": "a"
            }))
        }
    }
}

#[tokio::test]
async fn test_two_page_drain_yields_three_records_in_two_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(TwoPageApi)
        .expect(2)
        .mount(&mock_server)
        .await;

    let requester = PaginatedRequester::new(
        "items",
        mock_server.uri(),
        "/items",
        transport(),
    )
    .with_extractor(Arc::new(rill_cdk::extract::FieldPathExtractor::with_path(
        "data",
    )))
    .with_paginator(Arc::new(CursorPaginator::new("cursor", "next")));

    let records: Vec<Record> = requester
        .records(json!({}), json!({}), rill_cdk::partition::StreamSlice::new())
        .try_collect()
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].data["id"], json!(1));
    assert_eq!(records[2].data["id"], json!(3));
    // expect(2) on the mock verifies exactly two requests at drop.
}

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let requester = PaginatedRequester::new("flaky", mock_server.uri(), "/flaky", transport())
        .with_retry(fast_retry());

    let records: Vec<Record> = requester
        .records(json!({}), json!({}), rill_cdk::partition::StreamSlice::new())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_404_with_ignore_filter_yields_empty_stream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let handler = DefaultErrorHandler::new()
        .with_filter(ResponseFilter::new(ResponseAction::Ignore).with_http_codes([404]));
    let requester = PaginatedRequester::new("gone", mock_server.uri(), "/gone", transport())
        .with_handler(handler);

    let records: Vec<Record> = requester
        .records(json!({}), json!({}), rill_cdk::partition::StreamSlice::new())
        .try_collect()
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_401_fails_as_config_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "invalid api key"})),
        )
        .mount(&mock_server)
        .await;

    let requester =
        PaginatedRequester::new("private", mock_server.uri(), "/private", transport());

    let err = requester
        .records(json!({}), json!({}), rill_cdk::partition::StreamSlice::new())
        .try_collect::<Vec<Record>>()
        .await
        .unwrap_err();

    let Error::Failure {
        failure_type,
        message,
    } = err
    else {
        panic!("expected classified failure, got {err:?}");
    };
    assert_eq!(failure_type, FailureType::ConfigError);
    assert!(message.contains("invalid api key"));
}

#[tokio::test]
async fn test_auth_header_reaches_the_wire() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secured"))
        .and(header("Authorization", "Bearer sk_live_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"ok": true}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let requester = PaginatedRequester::new("secured", mock_server.uri(), "/secured", transport())
        .with_authenticator(Arc::new(rill_cdk::auth::BearerAuth::new("sk_live_1")));

    let records: Vec<Record> = requester
        .records(json!({}), json!({}), rill_cdk::partition::StreamSlice::new())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

// ============================================================================
// Declarative definition end-to-end
// ============================================================================

/// Regional API: each region path returns its own records with cursors.
struct RegionalApi;

impl Respond for RegionalApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let segments: Vec<_> = request.url.path_segments().unwrap().collect();
        let region = segments[0].to_string();
        let updated = match region.as_str() {
            "us" => "2024-02-01",
            "eu" => "2024-03-01",
            _ => "2024-01-15",
        };
        ResponseTemplate::new(200).set_body_json(json!({
            "orders": [{"id": format!("{region}-1"), "updated_at": updated}]
        }))
    }
}

fn regional_definition(url_base: &str) -> StreamDefinition {
    let yaml = format!(
        r"
name: orders
url_base: {url_base}
path: /{{{{ stream_slice.region }}}}/orders
headers:
  X-Token: '{{{{ config.api_key }}}}'
extractor:
  type: field_path
  path: orders
partitioning:
  type: list
  values: [us, eu, apac]
  partition_field: region
cursor:
  cursor_field: updated_at
  format: '%Y-%m-%d'
"
    );
    StreamDefinition::from_yaml(&yaml).unwrap()
}

#[tokio::test]
async fn test_declarative_sync_with_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(RegionalApi)
        .mount(&mock_server)
        .await;

    let state = StateManager::in_memory();
    let config = json!({"api_key": "tok_1"});

    let def = regional_definition(&mock_server.uri());
    let engine = def
        .build_engine(transport(), state.clone(), &config, None)
        .await
        .unwrap();

    let report = engine.sync(&config).await.unwrap();
    assert_eq!(report.stats.records_synced, 3);
    assert_eq!(report.stats.partitions_synced, 3);

    // The cursor landed on the furthest value across partitions.
    assert_eq!(
        state.cursor("orders", "updated_at").await,
        Some(json!("2024-03-01"))
    );

    // A resumed sync skips every completed partition.
    let engine = def
        .build_engine(transport(), state.clone(), &config, None)
        .await
        .unwrap();
    let report = engine.sync(&config).await.unwrap();
    assert_eq!(report.stats.records_synced, 0);
    assert_eq!(report.stats.partitions_skipped, 3);
}

#[tokio::test]
async fn test_declarative_substream_sync() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(RegionalApi)
        .mount(&mock_server)
        .await;

    let yaml = format!(
        r"
name: orders
url_base: {}
path: /{{{{ stream_slice.account }}}}/orders
extractor:
  type: field_path
  path: orders
partitioning:
  type: substream
  parent_key: id
  partition_field: account
",
        mock_server.uri()
    );
    let def = StreamDefinition::from_yaml(&yaml).unwrap();

    // Parent records materialized once by a previous stream's sync.
    let parents = vec![json!({"id": "us"}), json!({"id": "eu"}), json!({"id": "us"})];

    let engine = def
        .build_engine(transport(), StateManager::in_memory(), &json!({}), Some(parents))
        .await
        .unwrap();
    let report = engine.sync(&json!({})).await.unwrap();

    // Duplicate parents deduplicate to two partitions.
    assert_eq!(report.stats.partitions_synced, 2);
    assert_eq!(report.stats.records_synced, 2);
}

#[tokio::test]
async fn test_fail_fast_off_tolerates_a_bad_partition() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/eu/orders"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "region blocked"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(RegionalApi)
        .mount(&mock_server)
        .await;

    let config = json!({"api_key": "tok_1"});
    let def = regional_definition(&mock_server.uri());
    let engine = def
        .build_engine(transport(), StateManager::in_memory(), &config, None)
        .await
        .unwrap()
        .with_config(SyncConfig::new().with_fail_fast(false));

    let report = engine.sync(&config).await.unwrap();
    assert_eq!(report.stats.records_synced, 2);
    assert_eq!(report.stats.errors, 1);
}
