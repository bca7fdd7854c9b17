use super::error::ApiError;
use crate::application::orchestrator::SyncTrigger;
use crate::application::search::MarketWithScore;
use crate::domain::entities::comparison::ComparisonResult;
use crate::domain::entities::event::Event;
use crate::domain::entities::market::Market;
use crate::domain::values::market_status::MarketStatus;
use crate::MarketLink;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<MarketLink>,
    pub triggers: mpsc::Sender<SyncTrigger>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sync", post(trigger_sync))
        .route("/events", get(get_events))
        .route("/events/:ticker", get(get_event))
        .route("/markets", get(get_markets))
        .route("/markets/search", post(search_markets))
        .route("/relationships/:source/:target", get(get_relationship))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
pub struct SyncQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
    pub cursor: Option<i64>,
    /// Unix seconds, inclusive bound on the closest market close time.
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Deserialize)]
pub struct MarketsQuery {
    pub limit: Option<usize>,
    pub cursor: Option<i64>,
    pub event_ticker: Option<String>,
    pub status: Option<String>,
    /// Unix seconds, inclusive bound on the market close time.
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
    pub cursor: Option<i64>,
}

#[derive(Serialize)]
pub struct MarketsResponse {
    pub markets: Vec<Market>,
    pub cursor: Option<i64>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub markets: Vec<MarketWithScore>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn trigger_sync(
    State(state): State<ApiState>,
    Query(params): Query<SyncQuery>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    match state.triggers.try_send(SyncTrigger { force: params.force }) {
        Ok(()) => info!(force = params.force, "Sync trigger queued"),
        Err(TrySendError::Full(_)) => info!("Sync trigger already pending"),
        Err(TrySendError::Closed(_)) => return Err(ApiError::unavailable("sync driver is not running")),
    }
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "accepted" }))))
}

fn unix_seconds(name: &str, value: Option<i64>) -> Result<Option<DateTime<Utc>>, ApiError> {
    value
        .map(|secs| {
            DateTime::from_timestamp(secs, 0).ok_or_else(|| ApiError::bad_request(format!("{name} is out of range")))
        })
        .transpose()
}

async fn get_events(
    State(state): State<ApiState>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let from = unix_seconds("from", params.from)?;
    let to = unix_seconds("to", params.to)?;
    let page = state.engine.events(params.limit, params.cursor, from, to)?;
    Ok(Json(EventsResponse { events: page.items, cursor: page.cursor }))
}

async fn get_event(State(state): State<ApiState>, Path(ticker): Path<String>) -> Result<Json<Event>, ApiError> {
    state
        .engine
        .event(&ticker)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("event {ticker} not found")))
}

async fn get_markets(
    State(state): State<ApiState>,
    Query(params): Query<MarketsQuery>,
) -> Result<Json<MarketsResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<MarketStatus>().map_err(ApiError::bad_request))
        .transpose()?;
    let from = unix_seconds("from", params.from)?;
    let to = unix_seconds("to", params.to)?;
    let page = state
        .engine
        .markets(params.limit, params.cursor, params.event_ticker, status, from, to)?;
    Ok(Json(MarketsResponse { markets: page.items, cursor: page.cursor }))
}

async fn search_markets(
    State(state): State<ApiState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if !state.engine.search_available() {
        return Err(ApiError::unavailable("semantic search requires an embedding provider"));
    }
    let markets = state.engine.search(&req.query, req.limit).await?;
    Ok(Json(SearchResponse { markets }))
}

async fn get_relationship(
    State(state): State<ApiState>,
    Path((source, target)): Path<(String, String)>,
) -> Result<Json<ComparisonResult>, ApiError> {
    state
        .engine
        .related(&source, &target)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no relationship cached for {source} -> {target}")))
}
