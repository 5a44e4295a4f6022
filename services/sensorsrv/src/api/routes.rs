//! API routes configuration

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::handlers::*;
use crate::AppState;

/// Create API routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sensors", get(list_sensors))
        .route("/sensors/data", get(sensor_data))
        .route("/api/readings", post(ingest_readings))
        .route("/history/{sensor_id}", get(get_history))
        .route("/alerts", get(get_alerts))
        .route("/api/log-level", get(get_log_level).put(set_log_level))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
