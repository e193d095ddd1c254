// JSON handlers: live cache reads, durable range queries, and update ingestion

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use crate::models::{
    DailySummary, HourlySummary, MetricsRecord, PeriodicUpdate, RealtimeUpdate, Snapshot,
    StaticUpdate,
};

/// Package version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("agent {0} not found")]
    AgentNotFound(String),
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal(e) => {
                tracing::warn!(error = %e, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RangeParams {
    start: i64,
    end: i64,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AggregatedParams {
    start: i64,
    end: i64,
    interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WindowParams {
    start: i64,
    end: i64,
}

fn check_range(start: i64, end: i64) -> Result<(), ApiError> {
    if start > end {
        return Err(ApiError::InvalidRange { start, end });
    }
    Ok(())
}

/// GET /version — service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/summary — fleet-wide rollup of the live cache.
pub(super) async fn summary_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.get_summary())
}

/// GET /api/agents — current snapshot of every connected agent, keyed by agent id.
pub(super) async fn list_agents_handler(
    State(state): State<AppState>,
) -> Json<HashMap<String, Arc<Snapshot>>> {
    Json(state.service.get_all_current())
}

pub(super) async fn get_agent_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Arc<Snapshot>>, ApiError> {
    state
        .service
        .get_current(&id)
        .map(Json)
        .ok_or(ApiError::AgentNotFound(id))
}

pub(super) async fn remove_agent_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.service.on_agent_disconnect(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::AgentNotFound(id))
    }
}

/// GET /api/agents/{id}/history?limit= — live history ring, oldest first. No limit = everything.
pub(super) async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<Arc<Snapshot>>> {
    Json(state.service.get_history(&id, params.limit.unwrap_or(0)))
}

/// GET /api/history?limit= — live history of every agent, keyed by agent id.
pub(super) async fn all_history_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<HashMap<String, Vec<Arc<Snapshot>>>> {
    Json(state.service.get_all_history(params.limit.unwrap_or(0)))
}

pub(super) async fn range_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<MetricsRecord>>, ApiError> {
    check_range(params.start, params.end)?;
    let records = state
        .service
        .query_range(&id, params.start, params.end, params.limit.unwrap_or(0))
        .await?;
    Ok(Json(records))
}

pub(super) async fn aggregated_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<AggregatedParams>,
) -> Result<Json<Vec<MetricsRecord>>, ApiError> {
    check_range(params.start, params.end)?;
    let records = state
        .service
        .query_aggregated(&id, params.start, params.end, params.interval.as_deref())
        .await?;
    Ok(Json(records))
}

pub(super) async fn hourly_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<HourlySummary>>, ApiError> {
    check_range(params.start, params.end)?;
    let rows = state
        .service
        .hourly_summaries(&id, params.start, params.end)
        .await?;
    Ok(Json(rows))
}

pub(super) async fn daily_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<DailySummary>>, ApiError> {
    check_range(params.start, params.end)?;
    let rows = state
        .service
        .daily_summaries(&id, params.start, params.end)
        .await?;
    Ok(Json(rows))
}

pub(super) async fn full_metrics_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(snapshot): Json<Snapshot>,
) -> Json<Arc<Snapshot>> {
    Json(state.service.on_full_metrics(&id, snapshot))
}

pub(super) async fn realtime_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<RealtimeUpdate>,
) -> Json<Arc<Snapshot>> {
    Json(state.service.on_realtime_update(&id, &update))
}

pub(super) async fn static_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StaticUpdate>,
) -> Json<Arc<Snapshot>> {
    Json(state.service.on_static_update(&id, &update))
}

pub(super) async fn periodic_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PeriodicUpdate>,
) -> Json<Arc<Snapshot>> {
    Json(state.service.on_periodic_update(&id, &update))
}
