//! License plate endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use spotwatch_common::{Error, Plate};

use super::error::ApiError;
use crate::AppState;

fn plate_json(plate: &Plate) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(plate).map_err(Error::from)?)
}

/// GET /data/plates
pub async fn list_plates(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let plates = state.plates.list().await?;
    let body = plates
        .iter()
        .map(plate_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

/// GET /data/plates/:id
pub async fn get_plate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let plate = state.plates.get(&id).await?;
    Ok(Json(plate_json(&plate)?))
}

/// POST /data/plates/:id
pub async fn create_plate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let plate = state.plates.create(&id).await?;
    Ok((StatusCode::CREATED, Json(plate_json(&plate)?)))
}

/// DELETE /data/plates/:id
pub async fn delete_plate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.plates.delete(&id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}
