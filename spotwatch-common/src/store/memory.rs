//! In-process store
//!
//! Backs tests and single-node deployments without a remote database.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{Namespace, Store, StorePath};
use crate::Result;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<(&'static str, String), Value>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of set/delete calls since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

fn key(path: &StorePath) -> (&'static str, String) {
    (path.namespace().as_str(), path.id().to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(&key(path)).cloned())
    }

    async fn set(&self, path: &StorePath, record: Value) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.write().await;
        // A hierarchical store holds nothing at a path set to null
        if record.is_null() {
            records.remove(&key(path));
        } else {
            records.insert(key(path), record);
        }
        Ok(())
    }

    async fn delete(&self, path: &StorePath) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.records.write().await.remove(&key(path));
        Ok(())
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<(String, Value)>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|((ns, _), _)| *ns == namespace.as_str())
            .map(|((_, id), value)| (id.clone(), value.clone()))
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        let path = StorePath::sensor("s1").unwrap();

        assert_eq!(store.get(&path).await.unwrap(), None);
        store.set(&path, json!({"id": "s1"})).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), Some(json!({"id": "s1"})));

        store.delete(&path).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), None);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_namespace() {
        let store = MemoryStore::new();
        store.set(&StorePath::spot("b").unwrap(), json!({"id": "b"})).await.unwrap();
        store.set(&StorePath::spot("a").unwrap(), json!({"id": "a"})).await.unwrap();
        store.set(&StorePath::sensor("a").unwrap(), json!({"id": "a"})).await.unwrap();

        let spots = store.list(Namespace::Spots).await.unwrap();
        let ids: Vec<_> = spots.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
