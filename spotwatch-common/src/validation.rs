//! Inbound payload validation
//!
//! A field counts as present when it exists and is neither `null` nor the
//! empty string. Checks never mutate the payload and fail closed on the first
//! missing field, which is named in the returned error and logged.

use serde_json::{Map, Value};
use tracing::info;

use crate::{Error, Result};

/// Fields every sensor payload must carry
pub const SENSOR_FIELDS: &[&str] = &["id", "type"];

/// Fields the strict sensor-creation path additionally requires
pub const SENSOR_INIT_FIELDS: &[&str] = &["id", "type", "spot"];

/// Check that `payload` carries every field in `required`
pub fn verify(payload: &Map<String, Value>, required: &[&str]) -> Result<()> {
    for field in required {
        if !is_present(payload.get(*field)) {
            info!(field = %field, "Rejected payload: missing required field");
            return Err(Error::validation(*field));
        }
    }
    Ok(())
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Read a field as text, accepting strings, numbers and booleans
///
/// Ids and credentials arrive from devices as either strings or numbers;
/// both address the same record.
pub fn field_text(payload: &Map<String, Value>, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
