//! API request handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use city_history::HistoryEntry;
use common::{logging, AppError, HealthStatus, SuccessResponse};
use errors::CityError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;

use crate::models::{IngestReport, RawReading};
use crate::simulator::SimulatedReading;
use crate::AppState;

/// Public API version reported by `GET /`
pub const API_VERSION: &str = "1.0.0";

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Run an ingest under the configured request deadline
async fn within_deadline<T>(state: &AppState, fut: impl Future<Output = T>) -> Result<T, AppError> {
    let limit = state.config.request_timeout();
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        AppError::from(CityError::Timeout(format!(
            "ingest exceeded request deadline of {}ms",
            limit.as_millis()
        )))
    })
}

// === Service info ===

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Smart City API is live!",
        "timestamp": now_ms(),
        "version": API_VERSION
    }))
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus::healthy(
        state.config.service.name.clone(),
        env!("CARGO_PKG_VERSION"),
    ))
}

// === Sensors ===

pub async fn list_sensors(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "sensors": state.simulator.catalog() }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SensorDataResponse {
    pub data: Vec<SimulatedReading>,
    pub timestamp: i64,
    pub report: IngestReport,
}

/// Simulate one batch from the catalog and ingest it
pub async fn sensor_data(
    State(state): State<AppState>,
) -> Result<Json<SensorDataResponse>, AppError> {
    let now = now_ms();
    let data = state.simulator.generate(now);
    let readings: Vec<RawReading> = data.iter().map(RawReading::from).collect();

    let report = within_deadline(&state, state.pipeline.ingest(readings)).await?;
    Ok(Json(SensorDataResponse {
        data,
        timestamp: now,
        report,
    }))
}

/// Ingest a JSON array of readings; per-item failures still return 200
pub async fn ingest_readings(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<Json<IngestReport>, AppError> {
    let Json(items) = payload.map_err(|e| {
        AppError::from(CityError::BadRequest(format!(
            "expected a JSON array of readings: {}",
            e.body_text()
        )))
    })?;

    let report = within_deadline(&state, state.pipeline.ingest_json(items)).await?;
    Ok(Json(report))
}

// === History ===

pub async fn get_history(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let history = state.pipeline.history().read(&sensor_id).await?;
    Ok(Json(history))
}

// === Alerts ===

pub async fn get_alerts(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "thresholds": state.pipeline.thresholds(),
        "message": "Alert system active",
        "timestamp": now_ms()
    }))
}

// === Log level ===

#[derive(Debug, Serialize, Deserialize)]
pub struct LogLevelBody {
    pub level: String,
}

pub async fn get_log_level() -> Json<SuccessResponse<LogLevelBody>> {
    Json(SuccessResponse::new(LogLevelBody {
        level: logging::get_log_level(),
    }))
}

pub async fn set_log_level(
    payload: Result<Json<LogLevelBody>, JsonRejection>,
) -> Result<Json<SuccessResponse<LogLevelBody>>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    logging::set_log_level(&body.level)?;
    Ok(Json(SuccessResponse::new(LogLevelBody {
        level: logging::get_log_level(),
    })))
}
