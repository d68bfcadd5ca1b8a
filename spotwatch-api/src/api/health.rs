//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use spotwatch_common::reconciler::PassSummary;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub store: String,
    /// Sensor types the reconciler counts toward occupancy
    pub sensor_types: Vec<String>,
    /// Most recent reconciliation pass, if the reconciler runs here
    pub last_pass: Option<PassSummary>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (sensor_types, last_pass) = match &state.reconciler {
        Some(reconciler) => (
            reconciler.occupancy().types().map(str::to_string).collect(),
            reconciler.last_summary().await,
        ),
        None => (Vec::new(), None),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "spotwatch-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store_backend.to_string(),
        sensor_types,
        last_pass,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
