//! Sensor registry and spot linking
//!
//! A sensor references at most one spot and every spot lists the sensors that
//! reference it. Linking keeps both sides in step, but the store has no
//! transactions, so the link is a sequence of single-record writes:
//!
//! 1. load or create the target spot and add the sensor to its members
//! 2. detach the sensor from its previous spot and persist that spot
//! 3. persist the sensor with its new `spot`, then persist the target spot
//!
//! A failure after step 2 leaves the sensor detached from its old spot while
//! still naming it, or attached in the sensor record but missing from the
//! target's member set. The reconciler reports such drift on its next pass;
//! it does not repair it.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{SharedStore, SpotRegistry};
use crate::auth::Authenticator;
use crate::credentials::CredentialCache;
use crate::models::{Sensor, Spot, KEY_FIELD};
use crate::store::{Namespace, StorePath};
use crate::validation::{field_text, verify, SENSOR_FIELDS, SENSOR_INIT_FIELDS};
use crate::{Error, Result};

/// Outcome of an authenticated sensor write
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertResult {
    /// The id was unknown and a new sensor was registered
    Created(Sensor),
    /// An existing sensor was merged with the payload
    Updated(Sensor),
}

impl UpsertResult {
    pub fn sensor(&self) -> &Sensor {
        match self {
            UpsertResult::Created(sensor) | UpsertResult::Updated(sensor) => sensor,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertResult::Created(_))
    }

    /// Response body: the sensor without its key plus a `created`/`updated` marker
    pub fn to_json(&self) -> Result<Value> {
        let mut body = self.sensor().public_json()?;
        let marker = if self.is_created() { "created" } else { "updated" };
        if let Value::Object(map) = &mut body {
            map.insert(marker.to_string(), Value::Bool(true));
        }
        Ok(body)
    }
}

#[derive(Clone)]
pub struct SensorRegistry {
    store: SharedStore,
    spots: SpotRegistry,
    authenticator: Arc<dyn Authenticator>,
    credentials: Option<Arc<dyn CredentialCache>>,
}

impl SensorRegistry {
    pub fn new(store: SharedStore, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            spots: SpotRegistry::new(store.clone()),
            store,
            authenticator,
            credentials: None,
        }
    }

    /// Record the key of every newly created sensor in `cache`
    pub fn with_credential_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
        self.credentials = Some(cache);
        self
    }

    /// Register a new sensor from a payload carrying at least `id` and `type`
    ///
    /// The key is persisted with the record but stripped from the returned
    /// sensor. A payload naming a `spot` links the sensor to it (creating the
    /// spot if needed) before the fresh record is read back.
    pub async fn create(&self, payload: &Map<String, Value>) -> Result<Sensor> {
        verify(payload, SENSOR_FIELDS)?;
        self.create_verified(payload).await
    }

    /// Strict registration: like [`create`](Self::create) but `spot` is required
    pub async fn init(&self, payload: &Map<String, Value>) -> Result<Sensor> {
        verify(payload, SENSOR_INIT_FIELDS)?;
        self.create_verified(payload).await
    }

    async fn create_verified(&self, payload: &Map<String, Value>) -> Result<Sensor> {
        let sensor = into_sensor(normalize(payload.clone())?)?;

        let path = StorePath::sensor(&sensor.id)?;
        if self.store.get(&path).await?.is_some() {
            return Err(Error::AlreadyExists(format!("Sensor {}", sensor.id)));
        }

        self.store.set(&path, sensor.to_value()?).await?;
        info!(sensor_id = %sensor.id, sensor_type = %sensor.sensor_type, "Registered sensor");

        if let (Some(key), Some(cache)) = (&sensor.key, &self.credentials) {
            if let Err(e) = cache.record(&sensor.id, key).await {
                warn!(sensor_id = %sensor.id, "Failed to cache sensor credential: {}", e);
            }
        }

        if let Some(spot_id) = sensor.spot.clone() {
            self.attach(sensor.clone(), &spot_id).await?;
        }

        self.get(&sensor.id).await
    }

    /// Sensor record without its key
    pub async fn get(&self, id: &str) -> Result<Sensor> {
        Ok(self.load(id).await?.without_key())
    }

    /// Every readable sensor, keys stripped
    pub async fn list(&self) -> Result<Vec<Sensor>> {
        let records = self.store.list(Namespace::Sensors).await?;
        Ok(records
            .into_iter()
            .filter_map(|(id, value)| match Sensor::from_value(value) {
                Ok(sensor) => Some(sensor.without_key()),
                Err(e) => {
                    warn!(sensor_id = %id, "Skipping unreadable sensor record: {}", e);
                    None
                }
            })
            .collect())
    }

    /// The spot this sensor is linked to, if any
    pub async fn spot_of(&self, id: &str) -> Result<Option<Spot>> {
        match self.load(id).await?.spot {
            Some(spot_id) => self.spots.find(&spot_id).await,
            None => Ok(None),
        }
    }

    /// Authenticated write to a sensor, creating it when the id is unknown
    ///
    /// The path id overrides any `id` in the payload. For an existing sensor a
    /// changed `spot` is re-linked first (its error becomes this call's
    /// error), then the payload is merged over the stored record and saved
    /// without the key.
    pub async fn update(&self, id: &str, payload: &Map<String, Value>) -> Result<UpsertResult> {
        let provided = payload.get(KEY_FIELD).ok_or(Error::MissingAuth)?;
        let key = key_text(provided);
        if !self.authenticator.authenticate(id, key.as_deref()).await {
            warn!(sensor_id = %id, "Rejected sensor update: authentication failed");
            return Err(Error::AuthFailed(id.to_string()));
        }

        let mut payload = payload.clone();
        payload.insert("id".to_string(), Value::String(id.to_string()));

        let Some(stored) = self.find(id).await? else {
            debug!(sensor_id = %id, "Update for unknown sensor, creating it");
            let created = self.create(&payload).await?;
            return Ok(UpsertResult::Created(created));
        };

        if payload.contains_key("spot") {
            let requested = field_text(&payload, "spot");
            if requested != stored.spot {
                self.link_spot(id, &payload).await?;
            }
        }

        // Re-read: linking rewrites the sensor record
        let current = self.load(id).await?;
        let mut merged = match current.to_value()? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (field, value) in payload {
            merged.insert(field, value);
        }
        merged.remove(KEY_FIELD);

        let sensor = into_sensor(normalize(merged)?)?;
        self.store
            .set(&StorePath::sensor(id)?, sensor.to_value()?)
            .await?;
        debug!(sensor_id = %id, "Updated sensor");

        Ok(UpsertResult::Updated(sensor))
    }

    /// Move a sensor to the spot named in `payload`
    ///
    /// Preconditions are checked in order, each with its own error: the
    /// sensor exists, the payload has a key, the key authenticates, the
    /// payload names a spot.
    pub async fn link_spot(&self, sensor_id: &str, payload: &Map<String, Value>) -> Result<Sensor> {
        let sensor = self.load(sensor_id).await?;

        let provided = payload.get(KEY_FIELD).ok_or(Error::MissingAuth)?;
        let key = key_text(provided);
        if !self.authenticator.authenticate(sensor_id, key.as_deref()).await {
            warn!(sensor_id = %sensor_id, "Rejected spot link: authentication failed");
            return Err(Error::AuthFailed(sensor_id.to_string()));
        }

        let target = field_text(payload, "spot").ok_or_else(|| Error::validation("spot"))?;
        self.attach(sensor, &target).await
    }

    async fn attach(&self, mut sensor: Sensor, target_id: &str) -> Result<Sensor> {
        let mut target = match self.spots.find(target_id).await? {
            Some(spot) => spot,
            None => self.spots.create(target_id).await?,
        };
        target.sensors.insert(&sensor.id);

        if let Some(old_id) = sensor.spot.as_deref().filter(|old| *old != target_id) {
            match self.spots.find(old_id).await? {
                Some(mut old_spot) => {
                    old_spot.sensors.remove(&sensor.id);
                    self.spots.save(&old_spot).await?;
                    debug!(sensor_id = %sensor.id, spot_id = %old_id, "Detached sensor from previous spot");
                }
                None => warn!(
                    sensor_id = %sensor.id,
                    spot_id = %old_id,
                    "Previous spot missing while relinking sensor"
                ),
            }
        }

        sensor.spot = Some(target_id.to_string());
        let sensor = sensor.without_key();

        self.store
            .set(&StorePath::sensor(&sensor.id)?, sensor.to_value()?)
            .await?;
        self.spots.save(&target).await?;

        info!(sensor_id = %sensor.id, spot_id = %target_id, "Linked sensor to spot");
        Ok(sensor)
    }

    /// Full stored record, key included
    async fn load(&self, id: &str) -> Result<Sensor> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Sensor {}", id)))
    }

    async fn find(&self, id: &str) -> Result<Option<Sensor>> {
        let path = StorePath::sensor(id)?;
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(Sensor::from_value(value)?)),
            None => Ok(None),
        }
    }
}

/// Coerce the text fields of a sensor payload to strings
///
/// Devices send ids, types and keys as numbers as often as strings. An empty
/// or null `spot` means "no spot".
fn normalize(mut record: Map<String, Value>) -> Result<Map<String, Value>> {
    for field in ["id", "type"] {
        if let Some(text) = field_text(&record, field) {
            record.insert(field.to_string(), Value::String(text));
        }
    }

    match field_text(&record, "spot") {
        Some(spot) => {
            StorePath::spot(&spot)?;
            record.insert("spot".to_string(), Value::String(spot));
        }
        None => {
            record.remove("spot");
        }
    }

    match record.get(KEY_FIELD).and_then(key_text) {
        Some(key) => {
            record.insert(KEY_FIELD.to_string(), Value::String(key));
        }
        None => {
            record.remove(KEY_FIELD);
        }
    }

    Ok(record)
}

/// Build a sensor from a normalized record, naming the field that is unusable
fn into_sensor(record: Map<String, Value>) -> Result<Sensor> {
    for field in ["id", "type"] {
        if !matches!(record.get(field), Some(Value::String(_))) {
            return Err(Error::validation(field));
        }
    }
    Sensor::from_value(Value::Object(record)).map_err(|_| Error::validation("body"))
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
