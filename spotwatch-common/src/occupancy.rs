//! Occupancy reading table
//!
//! Maps a sensor type tag to the raw reading values that mean "occupied".
//! Loaded once from configuration and handed to the reconciler; read-only
//! afterwards.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccupancyTable(BTreeMap<String, Vec<Value>>);

impl Default for OccupancyTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(
            "ultrasonic".to_string(),
            vec![json!(true), json!(1), json!("occupied")],
        );
        OccupancyTable(table)
    }
}

impl OccupancyTable {
    pub fn new(entries: BTreeMap<String, Vec<Value>>) -> Self {
        OccupancyTable(entries)
    }

    /// `None` when the type is unknown
    pub fn is_occupied(&self, sensor_type: &str, reading: &Value) -> Option<bool> {
        let occupied = self.0.get(sensor_type)?;
        Some(occupied.iter().any(|v| readings_equal(v, reading)))
    }

    /// Sensor types that contribute to occupancy, in name order
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

// 1 and 1.0 are the same reading
fn readings_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
