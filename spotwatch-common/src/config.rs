//! Configuration loading
//!
//! The config file is resolved in priority order:
//! 1. Command-line argument
//! 2. `SPOTWATCH_CONFIG` environment variable
//! 3. `~/.config/spotwatch/config.toml`, then `/etc/spotwatch/config.toml`
//!
//! A path given explicitly (1 or 2) must exist. When no file is found the
//! compiled defaults are used and a warning is logged; a missing config never
//! prevents startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::occupancy::OccupancyTable;
use crate::{Error, Result};

pub const CONFIG_ENV_VAR: &str = "SPOTWATCH_CONFIG";

/// Credential database value selecting a private in-memory cache
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotwatchConfig {
    /// HTTP listen address
    pub bind_addr: String,
    /// Base directory for relative data paths
    pub data_dir: Option<PathBuf>,
    pub store: StoreConfig,
    pub reconciler: ReconcilerConfig,
    pub credentials: CredentialsConfig,
    /// Sensor type → readings that mean "occupied"
    pub occupancy: OccupancyTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Rtdb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database root URL, e.g. `https://<project>.firebaseio.com`
    pub url: Option<String>,
    /// Database secret or ID token, sent as the `auth` query parameter
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// SQLite file for the credential cache, or `:memory:`
    pub database: String,
}

impl Default for SpotwatchConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            data_dir: None,
            store: StoreConfig::default(),
            reconciler: ReconcilerConfig::default(),
            credentials: CredentialsConfig::default(),
            occupancy: OccupancyTable::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: None,
            auth_token: None,
            timeout_secs: 10,
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            database: "credentials.db".to_string(),
        }
    }
}

impl SpotwatchConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: SpotwatchConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reconciler.interval_secs == 0 {
            return Err(Error::Config(
                "reconciler.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Rtdb
            && self.store.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::Config("store.url is required for the rtdb backend".to_string()));
        }
        if self.store.timeout_secs == 0 {
            return Err(Error::Config("store.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Data directory, falling back to the platform default
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Credential cache file, `None` for an in-memory cache
    pub fn credentials_path(&self) -> Option<PathBuf> {
        let database = self.credentials.database.trim();
        if database == IN_MEMORY_DATABASE || database.is_empty() {
            return None;
        }
        let path = PathBuf::from(database);
        Some(if path.is_absolute() {
            path
        } else {
            self.data_dir().join(path)
        })
    }
}

/// Locate and parse the config file, or fall back to defaults
pub fn load_config(cli_path: Option<&Path>) -> Result<SpotwatchConfig> {
    let explicit = cli_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => match default_config_locations().into_iter().find(|p| p.exists()) {
            Some(path) => path,
            None => {
                warn!("No config file found, using compiled defaults");
                return Ok(SpotwatchConfig::default());
            }
        },
    };

    let text = std::fs::read_to_string(&path)?;
    let config = SpotwatchConfig::from_toml(&text)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("spotwatch").join("config.toml"));
    }
    if cfg!(unix) {
        locations.push(PathBuf::from("/etc/spotwatch/config.toml"));
    }
    locations
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("spotwatch"))
        .unwrap_or_else(|| PathBuf::from("./spotwatch_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = SpotwatchConfig::from_toml("").unwrap();
        assert_eq!(config, SpotwatchConfig::default());
        assert_eq!(config.reconciler.interval_secs, 10);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_full_file() {
        let config = SpotwatchConfig::from_toml(
            r#"
            bind_addr = "127.0.0.1:9000"
            data_dir = "/var/lib/spotwatch"

            [store]
            backend = "rtdb"
            url = "https://parking-demo.firebaseio.com"
            auth_token = "secret"

            [reconciler]
            interval_secs = 30

            [credentials]
            database = "keys.db"

            [occupancy]
            ultrasonic = [true]
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.store.backend, StoreBackend::Rtdb);
        assert_eq!(config.store.timeout_secs, 10);
        assert_eq!(config.reconciler.interval_secs, 30);
        assert!(config.reconciler.enabled);
        assert_eq!(
            config.credentials_path(),
            Some(PathBuf::from("/var/lib/spotwatch/keys.db"))
        );
        assert_eq!(config.occupancy.is_occupied("ultrasonic", &json!(1)), Some(false));
    }

    #[test]
    fn test_rtdb_without_url_rejected() {
        let result = SpotwatchConfig::from_toml("[store]\nbackend = \"rtdb\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = SpotwatchConfig::from_toml("[reconciler]\ninterval_secs = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_in_memory_credentials() {
        let mut config = SpotwatchConfig::default();
        config.credentials.database = IN_MEMORY_DATABASE.to_string();
        assert_eq!(config.credentials_path(), None);
    }
}
