//! spotwatch-api library - HTTP surface of the parking occupancy service
//!
//! JSON routes under `/data` for sensors, spots and plates, plus a few
//! human-readable HTML pages. All state lives in the store behind the
//! registries; handlers hold no data of their own.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use spotwatch_common::auth::Authenticator;
use spotwatch_common::credentials::CredentialCache;
use spotwatch_common::reconciler::Reconciler;
use spotwatch_common::registry::{PlateRegistry, SensorRegistry, SharedStore, SpotRegistry};
use spotwatch_common::store::Store;

pub mod api;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub sensors: SensorRegistry,
    pub spots: SpotRegistry,
    pub plates: PlateRegistry,
    /// Present when the background reconciler runs in this process
    pub reconciler: Option<Arc<Reconciler>>,
    /// Store backend name, reported by /health
    pub store_backend: &'static str,
}

impl AppState {
    pub fn new(store: SharedStore, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            store_backend: store.backend(),
            sensors: SensorRegistry::new(store.clone(), authenticator),
            spots: SpotRegistry::new(store.clone()),
            plates: PlateRegistry::new(store),
            reconciler: None,
        }
    }

    pub fn with_credential_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
        self.sensors = self.sensors.with_credential_cache(cache);
        self
    }

    pub fn with_reconciler(mut self, reconciler: Arc<Reconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    // JSON API
    let data = Router::new()
        .route("/data/sensors", get(api::list_sensors))
        .route(
            "/data/sensor/:id",
            get(api::get_sensor).post(api::update_sensor),
        )
        .route(
            "/data/sensor/:id/spot",
            get(api::get_sensor_spot).post(api::link_sensor_spot),
        )
        .route("/data/sensor/init/:id", post(api::init_sensor))
        .route("/data/spots", get(api::list_spots))
        .route("/data/spot/:id", get(api::get_spot))
        .route("/data/spot/:id/free", get(api::get_spot_free))
        .route("/data/spot/:id/sensors", get(api::get_spot_sensors))
        .route("/data/plates", get(api::list_plates))
        .route(
            "/data/plates/:id",
            get(api::get_plate)
                .post(api::create_plate)
                .delete(api::delete_plate),
        );

    // Human-readable pages
    let pages = Router::new()
        .route("/", get(api::serve_home))
        .route("/data", get(api::serve_data_guide))
        .route("/data/", get(api::serve_data_guide))
        .route("/data/view/spots", get(api::serve_spots_view))
        .route("/data/view/:id", get(api::serve_sensor_view));

    Router::new()
        .merge(data)
        .merge(pages)
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
