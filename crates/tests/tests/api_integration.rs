use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use rentscope_agents::Config;
use rentscope_api::build_app_with_config;
use serde_json::{json, Value};
use tower::ServiceExt;

fn snapshot_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/snapshot.json")
}

// Offline wiring: bundled snapshot, static generator, ledger in a temp dir.
async fn offline_app(dir: &tempfile::TempDir) -> Router {
    let mut config = Config::from_env();
    config.data_path = snapshot_path();
    config.data_url = None;
    config.live_mode = false;
    config.model_url = None;
    config.ledger_path = dir.path().join("ledger.jsonl");
    config.ledger_mirror_url = None;
    config.session_id = None;
    build_app_with_config(config).await.expect("app should build")
}

async fn post_query(app: Router, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/query")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_reports_dataset_and_checks() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(parsed["ok"], true);
    assert_eq!(parsed["live_mode"], false);
    assert_eq!(parsed["dataset"]["snapshot_month"], "2025-06");
    assert_eq!(parsed["checks"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = post_query(offline_app(&dir).await, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_query");

    let (status, body) = post_query(offline_app(&dir).await, json!({ "query": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_query");
}

#[tokio::test]
async fn city_median_query_answers_from_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    let (status, body) = post_query(
        app,
        json!({ "query": "median 1-bed rent in Toronto", "session_id": "it-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verify"]["ok"], true);
    assert!(body["answer"]["summary"].as_str().unwrap().contains("2500"));
    assert_eq!(body["actions"][0]["tool"], "get_rent_data");
    assert_eq!(body["meta"]["session_id"], "it-1");
    assert_eq!(body["meta"]["ledger"]["ok"], true);

    // planning, tool_execute, finalize, entry.
    let ledger_text = std::fs::read_to_string(dir.path().join("ledger.jsonl")).unwrap();
    assert_eq!(ledger_text.lines().count(), 4);
}

#[tokio::test]
async fn affordability_query_with_inline_args() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    let (status, body) = post_query(
        app,
        json!({
            "query": "is this affordable in Toronto? :: listing_price=2200 income_annual=80000"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verify"]["ok"], true);
    assert_eq!(body["answer"]["metrics"]["rti"], 0.33);
    assert_eq!(body["answer"]["summary"], "Near market and near target ratio");
    let actions = body["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1]["tool"], "evaluate_rent_affordability");
}

#[tokio::test]
async fn impossible_prefs_fail_verification_with_hints() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    let (status, body) = post_query(
        app,
        json!({ "query": "suggest areas in Toronto :: prefs={min_transit:99}" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verify"]["ok"], false);
    let reasons = body["verify"]["reasons"].as_array().unwrap();
    assert_eq!(reasons.len(), 3);
    assert_eq!(
        reasons[0],
        "No neighbourhoods matched the specified criteria"
    );
    assert_eq!(body["answer"]["reason"], "no_neighbourhood_passed_filters");
    assert!(body["answer"]["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn suggest_query_returns_ranked_neighbourhoods() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    let (status, body) = post_query(
        app,
        json!({ "query": "suggest areas in Toronto :: income_annual=80000" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verify"]["ok"], true);
    let recs = body["answer"]["recommendations"].as_array().unwrap();
    assert!(!recs.is_empty());
    assert!(recs.len() <= 3);
    assert!(recs[0]["why"].as_str().unwrap().contains("transit"));
}

#[tokio::test]
async fn unknown_city_is_a_failed_tool_call_not_a_500() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    let (status, body) = post_query(
        app,
        json!({ "query": "median rent please :: city=Atlantis" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verify"]["ok"], false);
    assert_eq!(body["answer"]["error"], "tool_failed");
    assert_eq!(body["answer"]["details"]["error"], "city_not_found");
    assert_eq!(body["actions"][0]["status"], 404);
}

#[tokio::test]
async fn selftest_endpoint_passes_on_the_bundled_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let app = offline_app(&dir).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/selftest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["ok"], true);
    assert_eq!(parsed["results"].as_array().unwrap().len(), 4);
}
