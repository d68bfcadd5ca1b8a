//! Spot endpoints (read-only; spots change through sensor links and the reconciler)

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use spotwatch_common::Error;
use tracing::warn;

use super::error::ApiError;
use crate::AppState;

/// GET /data/spots
pub async fn list_spots(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let spots = state.spots.list().await?;
    let body = spots
        .iter()
        .map(|spot| spot.to_value())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

/// GET /data/spot/:id
pub async fn get_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let spot = state.spots.get(&id).await?;
    Ok(Json(spot.to_value()?))
}

/// GET /data/spot/:id/free
pub async fn get_spot_free(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let free = state.spots.is_free(&id).await?;
    Ok(Json(json!({ "id": id, "free": free })))
}

/// GET /data/spot/:id/sensors
///
/// Member sensors in id order. Members whose record is gone are left out.
pub async fn get_spot_sensors(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let spot = state.spots.get(&id).await?;

    let mut body = Vec::with_capacity(spot.sensors.sensor_count());
    for sensor_id in spot.sensors.sensor_ids() {
        match state.sensors.get(sensor_id).await {
            Ok(sensor) => body.push(sensor.public_json()?),
            Err(Error::NotFound(_)) => {
                warn!(spot_id = %id, sensor_id = %sensor_id, "Spot lists a missing sensor");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Json(body))
}
