//! Sensor endpoints
//!
//! Mutating routes authenticate with the `key` field of the JSON body. No
//! response ever carries that field.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use spotwatch_common::Error;

use super::error::{parse_payload, ApiError};
use crate::AppState;

/// GET /data/sensors
pub async fn list_sensors(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let sensors = state.sensors.list().await?;
    let body = sensors
        .iter()
        .map(|sensor| sensor.public_json())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

/// GET /data/sensor/:id
pub async fn get_sensor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sensor = state.sensors.get(&id).await?;
    Ok(Json(sensor.public_json()?))
}

/// POST /data/sensor/:id
///
/// Authenticated update. An unknown id registers a new sensor and answers
/// 201 instead of 200.
pub async fn update_sensor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let payload = parse_payload(&body)?;
    let result = state.sensors.update(&id, &payload).await?;

    let status = if result.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result.to_json()?)))
}

/// GET /data/sensor/:id/spot
pub async fn get_sensor_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let spot = state
        .sensors
        .spot_of(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Spot for sensor {}", id)))?;
    Ok(Json(spot.to_value()?))
}

/// POST /data/sensor/:id/spot
///
/// Body: `{"key": ..., "spot": "<spot id>"}`
pub async fn link_sensor_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload = parse_payload(&body)?;
    let sensor = state.sensors.link_spot(&id, &payload).await?;
    Ok(Json(sensor.public_json()?))
}

/// POST /data/sensor/init/:id
///
/// Strict registration; fails with 409 when the id is taken.
pub async fn init_sensor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut payload = parse_payload(&body)?;
    payload.insert("id".to_string(), Value::String(id));

    let sensor = state.sensors.init(&payload).await?;
    Ok((StatusCode::CREATED, Json(sensor.public_json()?)))
}
