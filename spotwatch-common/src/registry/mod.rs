//! Sensor, spot and plate registries
//!
//! Registries own the read-modify-write sequences against the [`Store`]; none
//! of them lock, so concurrent requests and the reconciler interleave at
//! single-record granularity (last write wins).

use std::sync::Arc;

use crate::store::Store;

mod plates;
mod sensors;
mod spots;

pub use plates::PlateRegistry;
pub use sensors::{SensorRegistry, UpsertResult};
pub use spots::SpotRegistry;

/// Store handle shared by every registry and the reconciler
pub type SharedStore = Arc<dyn Store>;
