//! Sensor, spot and plate records as persisted in the store
//!
//! Records are kept as JSON objects in the store; unknown fields survive a
//! load/save cycle through the `extra` maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Error, Result};

/// Synthetic member every spot carries in its own sensor set
pub const SELF_MEMBER: &str = "spot";

/// Name of the credential field on sensor payloads and records
pub const KEY_FIELD: &str = "key";

/// A reporting device associated with zero or one spot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,

    /// Occupancy-semantics tag, looked up in the occupancy table
    #[serde(rename = "type")]
    pub sensor_type: String,

    /// Last reported reading (opaque)
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<String>,

    /// Registered credential, never part of a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sensor {
    /// Parse a stored record
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Copy with the credential removed
    pub fn without_key(&self) -> Self {
        Sensor {
            key: None,
            ..self.clone()
        }
    }

    /// JSON form safe to hand back to a caller
    pub fn public_json(&self) -> Result<Value> {
        self.without_key().to_value()
    }
}

/// Set of sensor ids attached to a spot, always containing [`SELF_MEMBER`]
///
/// Stored as an object keyed by member id (`{"spot": true, "s1": true}`),
/// which is the shape a hierarchical store can hold natively. A plain array
/// is accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MembersRepr", into = "BTreeMap<String, bool>")]
pub struct SpotMembers(BTreeSet<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum MembersRepr {
    Keyed(BTreeMap<String, Value>),
    Listed(Vec<String>),
}

impl From<MembersRepr> for SpotMembers {
    fn from(repr: MembersRepr) -> Self {
        let ids: BTreeSet<String> = match repr {
            MembersRepr::Keyed(map) => map.into_keys().collect(),
            MembersRepr::Listed(list) => list.into_iter().collect(),
        };
        let mut members = SpotMembers(ids);
        members.0.insert(SELF_MEMBER.to_string());
        members
    }
}

impl From<SpotMembers> for BTreeMap<String, bool> {
    fn from(members: SpotMembers) -> Self {
        members.0.into_iter().map(|id| (id, true)).collect()
    }
}

impl Default for SpotMembers {
    fn default() -> Self {
        let mut ids = BTreeSet::new();
        ids.insert(SELF_MEMBER.to_string());
        SpotMembers(ids)
    }
}

impl SpotMembers {
    /// Returns false when the id was already a member
    pub fn insert(&mut self, sensor_id: &str) -> bool {
        self.0.insert(sensor_id.to_string())
    }

    /// The self entry cannot be removed
    pub fn remove(&mut self, sensor_id: &str) -> bool {
        if sensor_id == SELF_MEMBER {
            return false;
        }
        self.0.remove(sensor_id)
    }

    pub fn contains(&self, sensor_id: &str) -> bool {
        self.0.contains(sensor_id)
    }

    /// Real sensor ids in lexicographic order, self entry excluded
    pub fn sensor_ids(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
            .filter(|id| *id != SELF_MEMBER)
    }

    /// Number of real sensors (self entry excluded)
    pub fn sensor_count(&self) -> usize {
        self.0.len() - 1
    }
}

/// A physical parking space tracked for occupancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: String,
    pub free: bool,
    #[serde(default)]
    pub sensors: SpotMembers,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Spot {
    /// Default state for a spot created on first reference
    pub fn new(id: &str) -> Self {
        Spot {
            id: id.to_string(),
            free: true,
            sensors: SpotMembers::default(),
            extra: Map::new(),
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parse a record listed under `spots/{id}`; a record written without its
    /// own `id` takes the one from its path
    pub fn from_record(id: &str, mut value: Value) -> Result<Self> {
        if let Value::Object(map) = &mut value {
            map.entry("id")
                .or_insert_with(|| Value::String(id.to_string()));
        }
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// License plate existence record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl Plate {
    pub fn new(id: &str) -> Self {
        Plate {
            id: id.to_string(),
            registered_at: Some(Utc::now()),
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Interpret a JSON body as an object payload
pub fn as_object(payload: Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(Error::validation("body")),
    }
}
