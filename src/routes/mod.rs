// HTTP routes: a thin JSON surface over MetricsService

mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::service::MetricsService;

pub use http::ApiError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) service: Arc<MetricsService>,
}

pub fn app(service: Arc<MetricsService>) -> Router {
    let state = AppState { service };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/summary", get(http::summary_handler)) // GET /api/summary
        .route("/api/agents", get(http::list_agents_handler)) // GET /api/agents
        .route("/api/history", get(http::all_history_handler)) // GET /api/history?limit=
        .route(
            "/api/agents/{id}",
            get(http::get_agent_handler).delete(http::remove_agent_handler),
        ) // GET, DELETE /api/agents/{id}
        .route("/api/agents/{id}/history", get(http::history_handler))
        .route("/api/agents/{id}/range", get(http::range_handler))
        .route("/api/agents/{id}/aggregated", get(http::aggregated_handler))
        .route("/api/agents/{id}/hourly", get(http::hourly_handler))
        .route("/api/agents/{id}/daily", get(http::daily_handler))
        .route("/api/agents/{id}/metrics", post(http::full_metrics_handler))
        .route("/api/agents/{id}/realtime", post(http::realtime_handler))
        .route("/api/agents/{id}/static", post(http::static_handler))
        .route("/api/agents/{id}/periodic", post(http::periodic_handler))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
