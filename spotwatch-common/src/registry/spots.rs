//! Spot registry

use tracing::{info, warn};

use super::SharedStore;
use crate::models::Spot;
use crate::store::{Namespace, StorePath};
use crate::{Error, Result};

#[derive(Clone)]
pub struct SpotRegistry {
    store: SharedStore,
}

impl SpotRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Persist a new spot with `free = true` and only the self member
    pub async fn create(&self, id: &str) -> Result<Spot> {
        let path = StorePath::spot(id)?;
        if self.store.get(&path).await?.is_some() {
            return Err(Error::AlreadyExists(format!("Spot {}", id)));
        }

        let spot = Spot::new(id);
        self.store.set(&path, spot.to_value()?).await?;
        info!(spot_id = %id, "Created spot");
        Ok(spot)
    }

    pub async fn get(&self, id: &str) -> Result<Spot> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Spot {}", id)))
    }

    pub async fn find(&self, id: &str) -> Result<Option<Spot>> {
        let path = StorePath::spot(id)?;
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(Spot::from_record(id, value)?)),
            None => Ok(None),
        }
    }

    pub async fn is_free(&self, id: &str) -> Result<bool> {
        Ok(self.get(id).await?.free)
    }

    /// Every readable spot; malformed records are logged and left out
    pub async fn list(&self) -> Result<Vec<Spot>> {
        let records = self.store.list(Namespace::Spots).await?;
        Ok(records
            .into_iter()
            .filter_map(|(id, value)| match Spot::from_record(&id, value) {
                Ok(spot) => Some(spot),
                Err(e) => {
                    warn!(spot_id = %id, "Skipping unreadable spot record: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn save(&self, spot: &Spot) -> Result<()> {
        let path = StorePath::spot(&spot.id)?;
        self.store.set(&path, spot.to_value()?).await
    }
}
