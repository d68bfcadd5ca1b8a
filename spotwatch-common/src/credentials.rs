//! Local cache of sensor credentials
//!
//! Holds a SHA-256 digest of each sensor's registered key so a future
//! [`Authenticator`](crate::auth::Authenticator) can check keys without a round
//! trip to the key authority. Raw keys are never written here.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

use crate::Result;

/// Lookup interface for registered sensor credentials
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Store (or replace) the digest of `key` for `sensor_id`
    async fn record(&self, sensor_id: &str, key: &str) -> Result<()>;

    /// Hex digest of the registered key, if any
    async fn lookup(&self, sensor_id: &str) -> Result<Option<String>>;

    async fn forget(&self, sensor_id: &str) -> Result<()>;
}

/// Hex-encoded SHA-256 of a credential
pub fn digest_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SQLite-backed credential cache
#[derive(Clone)]
pub struct SqliteCredentialCache {
    pool: SqlitePool,
}

impl SqliteCredentialCache {
    /// Open (creating if needed) the cache database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let newly_created = !db_path.exists();
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new credential cache: {}", db_path.display());
        } else {
            info!("Opened existing credential cache: {}", db_path.display());
        }

        Self::from_pool(pool).await
    }

    /// Private in-memory cache, for tests and `database = ":memory:"`
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sensor_keys (
                sensor_id TEXT PRIMARY KEY,
                key_hash TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CredentialCache for SqliteCredentialCache {
    async fn record(&self, sensor_id: &str, key: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sensor_keys (sensor_id, key_hash, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(sensor_id) DO UPDATE SET
                key_hash = excluded.key_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(sensor_id)
        .bind(digest_key(key))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup(&self, sensor_id: &str) -> Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT key_hash FROM sensor_keys WHERE sensor_id = ?")
                .bind(sensor_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }

    async fn forget(&self, sensor_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sensor_keys WHERE sensor_id = ?")
            .bind(sensor_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_hex_sha256() {
        let digest = digest_key("hunter2");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(digest, digest_key("hunter3"));
    }

    #[tokio::test]
    async fn test_record_lookup_forget() {
        let cache = SqliteCredentialCache::in_memory().await.unwrap();

        assert_eq!(cache.lookup("s1").await.unwrap(), None);

        cache.record("s1", "first").await.unwrap();
        assert_eq!(cache.lookup("s1").await.unwrap(), Some(digest_key("first")));

        cache.record("s1", "second").await.unwrap();
        assert_eq!(cache.lookup("s1").await.unwrap(), Some(digest_key("second")));

        cache.forget("s1").await.unwrap();
        assert_eq!(cache.lookup("s1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_backed_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.db");

        {
            let cache = SqliteCredentialCache::open(&path).await.unwrap();
            cache.record("s9", "k").await.unwrap();
            cache.close().await;
        }

        let reopened = SqliteCredentialCache::open(&path).await.unwrap();
        assert_eq!(reopened.lookup("s9").await.unwrap(), Some(digest_key("k")));
    }
}
