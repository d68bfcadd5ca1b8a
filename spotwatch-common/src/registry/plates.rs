//! License plate registry
//!
//! Plates are bare existence records with no link to sensors or spots.

use tracing::{info, warn};

use super::SharedStore;
use crate::models::Plate;
use crate::store::{Namespace, StorePath};
use crate::{Error, Result};

#[derive(Clone)]
pub struct PlateRegistry {
    store: SharedStore,
}

impl PlateRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Plate> {
        let path = StorePath::plate(id)?;
        match self.store.get(&path).await? {
            Some(value) => Plate::from_value(value),
            None => Err(Error::NotFound(format!("Plate {}", id))),
        }
    }

    pub async fn create(&self, id: &str) -> Result<Plate> {
        let path = StorePath::plate(id)?;
        if self.store.get(&path).await?.is_some() {
            return Err(Error::AlreadyExists(format!("Plate {}", id)));
        }

        let plate = Plate::new(id);
        self.store.set(&path, serde_json::to_value(&plate)?).await?;
        info!(plate = %id, "Registered plate");
        Ok(plate)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = StorePath::plate(id)?;
        if self.store.get(&path).await?.is_none() {
            return Err(Error::NotFound(format!("Plate {}", id)));
        }
        self.store.delete(&path).await?;
        info!(plate = %id, "Removed plate");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Plate>> {
        let records = self.store.list(Namespace::Plates).await?;
        Ok(records
            .into_iter()
            .filter_map(|(id, value)| match Plate::from_value(value) {
                Ok(plate) => Some(plate),
                Err(e) => {
                    warn!(plate = %id, "Skipping unreadable plate record: {}", e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_plate_lifecycle() {
        let plates = PlateRegistry::new(Arc::new(MemoryStore::new()));

        let created = plates.create("ABC123").await.unwrap();
        assert_eq!(created.id, "ABC123");
        assert!(created.registered_at.is_some());
        assert_eq!(plates.get("ABC123").await.unwrap(), created);

        assert!(matches!(plates.create("ABC123").await, Err(Error::AlreadyExists(_))));

        plates.delete("ABC123").await.unwrap();
        assert!(matches!(plates.get("ABC123").await, Err(Error::NotFound(_))));
        assert!(matches!(plates.delete("ABC123").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_plates() {
        let plates = PlateRegistry::new(Arc::new(MemoryStore::new()));
        plates.create("B2").await.unwrap();
        plates.create("A1").await.unwrap();

        let ids: Vec<_> = plates.list().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["A1", "B2"]);
    }

    #[tokio::test]
    async fn test_list_skips_unreadable_plate() {
        let store = Arc::new(MemoryStore::new());
        let plates = PlateRegistry::new(store.clone());
        plates.create("A1").await.unwrap();
        store
            .set(&StorePath::plate("B2").unwrap(), json!("not a plate"))
            .await
            .unwrap();

        let ids: Vec<_> = plates.list().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["A1"]);
    }
}
