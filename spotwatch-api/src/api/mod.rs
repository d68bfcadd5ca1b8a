//! HTTP API handlers for spotwatch-api

pub mod error;
pub mod health;
pub mod plates;
pub mod sensors;
pub mod spots;
pub mod ui;

pub use error::ApiError;
pub use health::health_routes;
pub use plates::{create_plate, delete_plate, get_plate, list_plates};
pub use sensors::{
    get_sensor, get_sensor_spot, init_sensor, link_sensor_spot, list_sensors, update_sensor,
};
pub use spots::{get_spot, get_spot_free, get_spot_sensors, list_spots};
pub use ui::{serve_data_guide, serve_home, serve_sensor_view, serve_spots_view};
