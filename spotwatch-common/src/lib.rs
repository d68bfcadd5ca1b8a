//! # Spotwatch Common Library
//!
//! Everything the parking occupancy service does that is not HTTP:
//! - Sensor, spot and plate records
//! - Store adapter contract plus in-memory and Firebase RTDB adapters
//! - Payload validation and the pluggable sensor authenticator
//! - Sensor/spot registries, including spot linking
//! - The periodic occupancy reconciler
//! - Configuration loading

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod occupancy;
pub mod reconciler;
pub mod registry;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
pub use models::{Plate, Sensor, Spot, SpotMembers};
pub use occupancy::OccupancyTable;
