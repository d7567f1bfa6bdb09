// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /analyze (oracle path, fallback path, empty text)
// - POST /batch
// - GET|POST /search and GET /history
// - missing search credentials -> 503

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use sentiment_sentinel::analyze::{MockProvider, NoPacing, OracleAdapter, OracleError, ScoringPolicy};
use sentiment_sentinel::api::{self, AppState};
use sentiment_sentinel::config::{OracleConfig, SearchConfig, SentinelConfig};
use sentiment_sentinel::ingest::providers::StaticSource;
use sentiment_sentinel::Pipeline;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn state_with(provider: MockProvider) -> AppState {
    let source = StaticSource::from_fixture(include_str!("fixtures/headlines.json"))
        .expect("fixture parses");
    let policy = Arc::new(ScoringPolicy::new(
        Arc::new(OracleAdapter::new(provider, Duration::from_secs(1))),
        Arc::new(NoPacing),
    ));
    AppState::new(
        Pipeline::new(Arc::new(source), policy, SearchConfig::default()),
        10,
    )
}

fn test_router(provider: MockProvider) -> Router {
    api::router(state_with(provider))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&payload).expect("serialize payload")))
        .expect("build POST")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router(MockProvider::fixed("0"));
    let resp = app.oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "ok");
}

#[tokio::test]
async fn api_analyze_uses_oracle_score() {
    let app = test_router(MockProvider::fixed("7"));
    let (status, v) = send(app, post_json("/analyze", json!({"text": "Acme wins contract"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert!((v["score"].as_f64().unwrap() - 0.7).abs() < 1e-9);
    assert_eq!(v["category"], "positive");
    assert_eq!(v["scorer"], "oracle");
    assert_eq!(v["degraded"], false);
    assert!(v.get("degraded_reason").is_none());
}

#[tokio::test]
async fn api_analyze_falls_back_when_oracle_fails() {
    let app = test_router(MockProvider::failing(OracleError::TransportFailure(
        "connection refused".into(),
    )));
    let (status, v) = send(
        app,
        post_json("/analyze", json!({"text": "Terrible losses and awful layoffs"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["scorer"], "lexicon");
    assert_eq!(v["degraded"], true);
    assert_eq!(v["degraded_reason"], "transport_failure");
    assert_eq!(v["category"], "negative");
    assert!(v["score"].as_f64().unwrap() < -0.05);
}

#[tokio::test]
async fn api_analyze_rejects_empty_text() {
    let app = test_router(MockProvider::fixed("0"));
    let (status, v) = send(app, post_json("/analyze", json!({"text": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn api_batch_scores_and_summarizes() {
    let app = test_router(MockProvider::sequence(vec![Ok("6".into()), Ok("-8".into())]));
    let payload = json!([
        {"title": "Acme beats estimates", "source": "a.example"},
        {"title": "", "source": "a.example"},
        {"title": "Acme misses guidance", "source": "b.example"}
    ]);
    let (status, v) = send(app, post_json("/batch", payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["skipped"], 1);
    assert_eq!(v["degraded"], 0);
    let recs = v["records"].as_array().unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["title"], "Acme beats estimates");
    assert_eq!(recs[0]["sentiment_category"], "positive");
    assert_eq!(recs[1]["sentiment_category"], "negative");

    let summary = &v["summary"];
    assert_eq!(summary["article_count"], 2);
    assert_eq!(summary["positive_count"], 1);
    assert_eq!(summary["negative_count"], 1);
    assert!((summary["mean_sentiment"].as_f64().unwrap() - (-0.1)).abs() < 1e-9);
    assert_eq!(summary["ranked_by_impact"][0]["title"], "Acme misses guidance");
}

#[tokio::test]
async fn api_batch_skips_null_titles_instead_of_rejecting() {
    let app = test_router(MockProvider::fixed("4"));
    let payload = json!([
        {"title": null, "source": "a.example"},
        {"title": "Acme expands plant", "source": "a.example", "link": null}
    ]);
    let (status, v) = send(app, post_json("/batch", payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["skipped"], 1);
    assert_eq!(v["summary"]["article_count"], 1);
    assert_eq!(v["records"][0]["title"], "Acme expands plant");
}

#[tokio::test]
async fn api_search_post_filters_dedups_and_records_history() {
    let state = state_with(MockProvider::sequence(vec![
        Ok("6".into()),
        Ok("-8".into()),
        Ok("0".into()),
    ]));
    let app = api::router(state.clone());

    let (status, v) = send(
        app.clone(),
        post_json("/search", json!({"queries": ["tesla"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Ford is filtered, the mirrored surge headline is a duplicate; newest first.
    let titles: Vec<_> = v["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Tesla shares surge after record deliveries",
            "Tesla recalls thousands of vehicles over faulty airbags",
            "Tesla to hold annual meeting in Austin",
        ]
    );
    assert_eq!(v["records"][0]["query"], "tesla");
    assert_eq!(v["summary"]["neutral_count"], 1);
    let mean = v["summary"]["mean_sentiment"].as_f64().unwrap();
    assert!((mean - (-0.0667)).abs() < 0.001);
    assert_eq!(v["by_query"][0]["query"], "tesla");
    assert!(v["failed_queries"].as_array().unwrap().is_empty());

    let (status, h) = send(app, get("/history?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = h.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["article_count"], 3);
    assert_eq!(
        entries[0]["top_titles"][0],
        "Tesla recalls thousands of vehicles over faulty airbags"
    );
}

#[tokio::test]
async fn api_search_get_respects_limit() {
    let app = test_router(MockProvider::fixed("1"));
    let (status, v) = send(app, get("/search?q=tesla&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["records"].as_array().unwrap().len(), 2);
    assert_eq!(v["queries"], json!(["tesla"]));
}

#[tokio::test]
async fn api_search_without_queries_is_400() {
    let app = test_router(MockProvider::fixed("1"));
    let (status, _) = send(app, post_json("/search", json!({"queries": ["  "]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_search_without_credentials_is_503() {
    let cfg = SentinelConfig {
        oracle: OracleConfig {
            enabled: false,
            ..OracleConfig::default()
        },
        search: SearchConfig {
            api_key: String::new(),
            cse_id: String::new(),
            ..SearchConfig::default()
        },
        ..SentinelConfig::default()
    };
    let app = api::router(AppState::from_config(&cfg));

    let (status, v) = send(app.clone(), post_json("/search", json!({"queries": ["tesla"]}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(v["error"].as_str().unwrap().contains("GOOGLE_API_KEY"));

    // Scoring a single headline still works on the lexicon.
    let (status, v) = send(app, post_json("/analyze", json!({"text": "Great results"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["scorer"], "lexicon");
}
