//! Store adapter contract
//!
//! The backing store is hierarchical and path addressed (`sensors/{id}`,
//! `spots/{id}`, `plates/{id}`). Each single-path write is atomic at the store;
//! nothing spans paths, so multi-record updates in the registries are plain
//! sequences of writes.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::{Error, Result};

mod memory;
mod rtdb;

pub use memory::MemoryStore;
pub use rtdb::RtdbStore;

/// Top-level store namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Sensors,
    Spots,
    Plates,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Sensors => "sensors",
            Namespace::Spots => "spots",
            Namespace::Plates => "plates",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of a single record: namespace plus record id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    namespace: Namespace,
    id: String,
}

impl StorePath {
    /// Rejects ids that would address a different path in the store
    pub fn new(namespace: Namespace, id: &str) -> Result<Self> {
        if !is_valid_id(id) {
            return Err(Error::validation("id"));
        }
        Ok(StorePath {
            namespace,
            id: id.to_string(),
        })
    }

    pub fn sensor(id: &str) -> Result<Self> {
        Self::new(Namespace::Sensors, id)
    }

    pub fn spot(id: &str) -> Result<Self> {
        Self::new(Namespace::Spots, id)
    }

    pub fn plate(id: &str) -> Result<Self> {
        Self::new(Namespace::Plates, id)
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.id)
    }
}

/// Firebase key rules: non-empty, no path separators or reserved characters
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 768
        && !id
            .chars()
            .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
}

/// Typed get/set/delete against path-addressed records
#[async_trait]
pub trait Store: Send + Sync {
    /// `None` when nothing is stored at `path`
    async fn get(&self, path: &StorePath) -> Result<Option<Value>>;

    async fn set(&self, path: &StorePath, record: Value) -> Result<()>;

    async fn delete(&self, path: &StorePath) -> Result<()>;

    /// Every record under a namespace as `(id, record)` pairs
    async fn list(&self, namespace: Namespace) -> Result<Vec<(String, Value)>>;

    /// Backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;
}

/// Build the store adapter selected by configuration
pub fn open(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store (records are lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Rtdb => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| Error::Config("store.url is required for the rtdb backend".to_string()))?;
            info!("Using Firebase RTDB store at {}", url);
            Ok(Arc::new(RtdbStore::new(
                url,
                config.auth_token.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}
