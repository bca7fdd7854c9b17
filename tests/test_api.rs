mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use marketlink::api::routes::{router, ApiState};
use marketlink::application::orchestrator::SyncTrigger;
use marketlink::domain::ports::chat_model::ChatModel;
use marketlink::domain::ports::embedding_port::EmbeddingProvider;
use marketlink::infrastructure::embeddings::noop::NoopProvider;
use marketlink::MarketLink;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

async fn engine(embedder: Arc<dyn EmbeddingProvider>) -> Arc<MarketLink> {
    let engine = MarketLink::with_providers(
        ":memory:",
        Arc::new(FakeExchange::single(vec![championship()])),
        embedder,
        Some(Arc::new(StubChat::exclusive()) as Arc<dyn ChatModel>),
        true,
        settings(),
    )
    .unwrap();
    engine.sync(now(), false).await;
    Arc::new(engine)
}

fn app(engine: Arc<MarketLink>) -> (Router, mpsc::Receiver<SyncTrigger>) {
    let (triggers, rx) = mpsc::channel(1);
    (router(ApiState { engine, triggers }), rx)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (app, _rx) = app(engine(Arc::new(NoopProvider)).await);
    let (status, body) = send(app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_sync_trigger_is_queued() {
    let (app, mut rx) = app(engine(Arc::new(NoopProvider)).await);

    let (status, body) = send(app, "POST", "/sync?force=true", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    assert!(rx.try_recv().unwrap().force);
}

#[tokio::test]
async fn test_sync_trigger_without_driver_is_unavailable() {
    let (app, rx) = app(engine(Arc::new(NoopProvider)).await);
    drop(rx);

    let (status, _) = send(app, "POST", "/sync", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_list_markets_with_filters() {
    let (app, _rx) = app(engine(Arc::new(NoopProvider)).await);

    let (status, body) = send(app.clone(), "GET", "/markets?event_ticker=CHAMP&status=active", None).await;
    assert_eq!(status, StatusCode::OK);
    let tickers: Vec<&str> = body["markets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["ticker"].as_str().unwrap())
        .collect();
    assert_eq!(tickers, vec!["CHAMP-A", "CHAMP-B"]);
    assert!(body["cursor"].is_null());

    let (status, body) = send(app.clone(), "GET", "/markets?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["markets"].as_array().unwrap().len(), 1);
    let cursor = body["cursor"].as_i64().unwrap();

    let (_, body) = send(app, "GET", &format!("/markets?limit=1&cursor={cursor}"), None).await;
    assert_eq!(body["markets"][0]["ticker"], "CHAMP-B");
}

#[tokio::test]
async fn test_list_events_by_close_window() {
    let (app, _rx) = app(engine(Arc::new(NoopProvider)).await);
    let from = days(4).timestamp();
    let to = days(6).timestamp();

    let (status, body) = send(app.clone(), "GET", &format!("/events?from={from}&to={to}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"][0]["external_id"], "CHAMP");

    let (_, body) = send(app, "GET", &format!("/events?from={to}"), None).await;
    assert!(body["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_markets_by_close_window() {
    let (app, _rx) = app(engine(Arc::new(NoopProvider)).await);
    // CHAMP-A closes at day 5, CHAMP-B twelve hours later.
    let from = days(5).timestamp();
    let to = days(5).timestamp() + 6 * 3600;

    let (status, body) = send(app.clone(), "GET", &format!("/markets?from={from}&to={to}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let tickers: Vec<&str> = body["markets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["ticker"].as_str().unwrap())
        .collect();
    assert_eq!(tickers, vec!["CHAMP-A"]);

    let (_, body) = send(app.clone(), "GET", &format!("/markets?from={to}"), None).await;
    assert_eq!(body["markets"][0]["ticker"], "CHAMP-B");

    let (status, _) = send(app, "GET", &format!("/markets?to={}", i64::MAX), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_event_lookup_by_ticker() {
    let (app, _rx) = app(engine(Arc::new(NoopProvider)).await);

    let (status, body) = send(app.clone(), "GET", "/events/CHAMP", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["external_id"], "CHAMP");
    assert_eq!(body["title"], "Championship winner");

    let (status, body) = send(app, "GET", "/events/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("NOPE"));
}

#[tokio::test]
async fn test_search_requires_embedding_provider() {
    let (app, _rx) = app(engine(Arc::new(NoopProvider)).await);

    let (status, body) = send(app, "POST", "/markets/search", Some(serde_json::json!({ "query": "team b" }))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("embedding"));
}

#[tokio::test]
async fn test_search_returns_nearest_market_first() {
    let (app, _rx) = app(engine(Arc::new(KeywordEmbedder::default())).await);

    let (status, body) = send(
        app.clone(),
        "POST",
        "/markets/search",
        Some(serde_json::json!({ "query": "Team B championship", "limit": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["markets"][0]["market"]["ticker"], "CHAMP-B");

    let (status, _) = send(app, "POST", "/markets/search", Some(serde_json::json!({ "query": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_relationship_lookup() {
    let (app, _rx) = app(engine(Arc::new(KeywordEmbedder::default())).await);

    let (status, body) = send(app.clone(), "GET", "/relationships/CHAMP-A/CHAMP-B", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_yes"], "target_no");
    assert!(body["source_no"].is_null());

    let (status, _) = send(app, "GET", "/relationships/CHAMP-A/UNKNOWN", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
