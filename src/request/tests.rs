//! Tests for request option assembly

use super::*;
use crate::interpolate::Context;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;

fn ctx() -> Context {
    let mut ctx = Context::with_config(json!({"api_key": "sk_123", "page_size": 50}));
    ctx.set_stream_slice(json!({"start": "2024-01-01", "end": "2024-01-31"}));
    ctx.set_stream_state(json!({"updated_at": "2024-01-15"}));
    ctx.set_next_page_token(json!({"token": "cursor_9"}));
    ctx
}

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn test_params_interpolate_full_context() {
    let provider = RequestOptionsProvider::new().with_params(map(&[
        ("since", "{{ stream_slice.start }}"),
        ("until", "{{ stream_slice.end }}"),
        ("limit", "{{ config.page_size }}"),
        ("cursor", "{{ next_page_token.token }}"),
    ]));

    let options = provider.request_options(&ctx()).unwrap();
    assert_eq!(options.params.get("since").unwrap(), "2024-01-01");
    assert_eq!(options.params.get("until").unwrap(), "2024-01-31");
    assert_eq!(options.params.get("limit").unwrap(), "50");
    assert_eq!(options.params.get("cursor").unwrap(), "cursor_9");
}

#[test]
fn test_empty_values_are_omitted() {
    let provider = RequestOptionsProvider::new()
        .with_params(map(&[("cursor", "{{ next_page_token.token }}")]));

    // No token yet: the parameter drops out instead of rendering empty.
    let options = provider.request_options(&Context::new()).unwrap();
    assert!(options.params.is_empty());
    assert!(options.headers.is_empty());
    assert!(options.body.is_none());
}

#[test]
fn test_headers_interpolate() {
    let provider = RequestOptionsProvider::new()
        .with_headers(map(&[("Authorization", "Bearer {{ config.api_key }}")]));

    let options = provider.request_options(&ctx()).unwrap();
    assert_eq!(
        options.headers.get("Authorization").unwrap(),
        "Bearer sk_123"
    );
}

#[test]
fn test_json_body_renders_templates() {
    let provider = RequestOptionsProvider::new()
        .with_body_json(json!({
            "query": {"updated_after": "{{ stream_state.updated_at }}"},
            "limit": "{{ config.page_size }}"
        }))
        .unwrap();

    let options = provider.request_options(&ctx()).unwrap();
    assert_eq!(
        options.body,
        Some(RequestBody::Json(json!({
            "query": {"updated_after": "2024-01-15"},
            "limit": 50
        })))
    );
}

#[test]
fn test_form_body_renders_templates() {
    let provider = RequestOptionsProvider::new()
        .with_body_form(map(&[("grant_type", "client_credentials"), ("key", "{{ config.api_key }}")]))
        .unwrap();

    let options = provider.request_options(&ctx()).unwrap();
    let Some(RequestBody::Form(form)) = options.body else {
        panic!("expected form body");
    };
    assert_eq!(form.get("grant_type").unwrap(), "client_credentials");
    assert_eq!(form.get("key").unwrap(), "sk_123");
}

#[test]
fn test_both_body_forms_is_construction_error() {
    let result = RequestOptionsProvider::new()
        .with_body_json(json!({"a": 1}))
        .unwrap()
        .with_body_form(map(&[("a", "1")]));
    assert!(result.is_err());

    let result = RequestOptionsProvider::new()
        .with_body_form(map(&[("a", "1")]))
        .unwrap()
        .with_body_json(json!({"a": 1}));
    assert!(result.is_err());
}

// ============================================================================
// Slot injection
// ============================================================================

#[test]
fn test_slot_injects_query_param() {
    let mut options = RequestOptions::new();
    RequestOptionSlot::QueryParam("page".to_string()).apply("3", &mut options);
    assert_eq!(options.params.get("page").unwrap(), "3");
}

#[test]
fn test_slot_injects_header() {
    let mut options = RequestOptions::new();
    RequestOptionSlot::Header("X-Cursor".to_string()).apply("abc", &mut options);
    assert_eq!(options.headers.get("X-Cursor").unwrap(), "abc");
}

#[test]
fn test_slot_injects_into_existing_json_body() {
    let mut options = RequestOptions::new();
    options.body = Some(RequestBody::Json(json!({"filter": "active"})));
    RequestOptionSlot::BodyJson("cursor".to_string()).apply("tok_1", &mut options);
    assert_eq!(
        options.body,
        Some(RequestBody::Json(
            json!({"filter": "active", "cursor": "tok_1"})
        ))
    );
}

#[test]
fn test_slot_creates_body_when_missing() {
    let mut options = RequestOptions::new();
    RequestOptionSlot::BodyJson("cursor".to_string()).apply("tok_1", &mut options);
    assert_eq!(
        options.body,
        Some(RequestBody::Json(json!({"cursor": "tok_1"})))
    );

    let mut options = RequestOptions::new();
    RequestOptionSlot::BodyForm("cursor".to_string()).apply("tok_2", &mut options);
    let Some(RequestBody::Form(form)) = options.body else {
        panic!("expected form body");
    };
    assert_eq!(form.get("cursor").unwrap(), "tok_2");
}

#[test]
fn test_merge_over_lets_other_side_win() {
    let mut options = RequestOptions::new();
    options.set_header("Authorization", "Bearer old");
    options.set_param("key", "from-provider");

    let mut auth_headers = HashMap::new();
    auth_headers.insert("Authorization".to_string(), "Bearer fresh".to_string());
    options.merge_over(HashMap::new(), auth_headers);

    assert_eq!(options.headers.get("Authorization").unwrap(), "Bearer fresh");
    assert_eq!(options.params.get("key").unwrap(), "from-provider");
}
