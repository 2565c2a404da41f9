//! # Node Configuration
//!
//! One TOML file per node home, `<home>/config/cadence.toml`, plus the
//! genesis file `<home>/config/genesis.toml`. Every section has defaults, so
//! a missing file or a partial file is fine. A few settings can be
//! overridden from the environment:
//!
//! - `CADENCE_CHAIN_ID`
//! - `CADENCE_HTTP_PORT`
//! - `CADENCE_BLOCK_INTERVAL_MS`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use cc_04_statesync::StateSyncConfig;
use cc_05_storage::DEFAULT_MAX_FILE_SIZE;
use cc_07_api_gateway::GatewayConfig;
use chain_store::StoreBackend;
use shared_types::Validator;

pub const CONFIG_DIR: &str = "config";
pub const DATA_DIR: &str = "data";
pub const CONFIG_FILE: &str = "cadence.toml";
pub const GENESIS_FILE: &str = "genesis.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node home; set by [`NodeConfig::load`], never read from the file.
    #[serde(skip)]
    pub home: PathBuf,
    pub chain_id: String,
    /// JSON-RPC gateway.
    pub http: GatewayConfig,
    pub storage: StorageConfig,
    /// Development block producer.
    pub engine: EngineConfig,
    pub statesync: StateSyncConfig,
    /// Upper bound on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from("."),
            chain_id: "cadence-devnet".to_string(),
            http: GatewayConfig::default(),
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
            statesync: StateSyncConfig::default(),
            shutdown_grace_secs: 10,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    /// Largest file `storage_upload` accepts.
    pub max_file_size: usize,
    /// Blocks of history to keep; 0 keeps everything.
    pub retain_blocks: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            retain_blocks: 0,
        }
    }
}

/// Development engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub block_interval_ms: u64,
    pub max_block_txs: usize,
    /// Proposal size limit handed to PrepareProposal; 0 means unlimited.
    pub max_tx_bytes: i64,
    pub mempool_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: 1000,
            max_block_txs: 500,
            max_tx_bytes: 1024 * 1024,
            mempool_capacity: 5000,
        }
    }
}

impl EngineConfig {
    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }
}

impl NodeConfig {
    /// Read `<home>/config/cadence.toml` if it exists, apply environment
    /// overrides and validate.
    pub fn load(home: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let home = home.as_ref();
        let path = config_path(home);
        let mut config = if path.exists() {
            let raw = read(&path)?;
            toml::from_str::<NodeConfig>(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            NodeConfig::default()
        };
        config.home = home.to_path_buf();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CADENCE_*` overrides found through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(chain_id) = lookup("CADENCE_CHAIN_ID") {
            self.chain_id = chain_id;
        }
        if let Some(port) = lookup("CADENCE_HTTP_PORT") {
            self.http.port = parse_override("CADENCE_HTTP_PORT", &port)?;
        }
        if let Some(ms) = lookup("CADENCE_BLOCK_INTERVAL_MS") {
            self.engine.block_interval_ms = parse_override("CADENCE_BLOCK_INTERVAL_MS", &ms)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid("chain_id cannot be empty".into()));
        }
        if self.engine.block_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.block_interval_ms cannot be 0".into(),
            ));
        }
        if self.engine.max_block_txs == 0 {
            return Err(ConfigError::Invalid("engine.max_block_txs cannot be 0".into()));
        }
        if self.statesync.chunk_size == 0 {
            return Err(ConfigError::Invalid("statesync.chunk_size cannot be 0".into()));
        }
        self.http
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Write this configuration to `<home>/config/cadence.toml`.
    pub fn write(&self, home: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
        let path = config_path(home.as_ref());
        write(&path, &toml::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.home.join(DATA_DIR)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Chain parameters fixed at genesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub chain_id: String,
    #[serde(default = "default_initial_height")]
    pub initial_height: u64,
    /// Unix milliseconds.
    #[serde(default)]
    pub genesis_time: i64,
    #[serde(default)]
    pub validators: Vec<Validator>,
}

fn default_initial_height() -> u64 {
    1
}

impl GenesisConfig {
    /// Genesis with one validator holding all the power.
    pub fn single_validator(chain_id: impl Into<String>, pub_key: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            initial_height: 1,
            genesis_time: chrono::Utc::now().timestamp_millis(),
            validators: vec![Validator {
                pub_key: pub_key.into(),
                power: 10,
                name: "genesis".to_string(),
            }],
        }
    }

    pub fn load(home: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = genesis_path(home.as_ref());
        let raw = read(&path)?;
        let genesis: GenesisConfig =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
        genesis.validate()?;
        Ok(genesis)
    }

    pub fn write(&self, home: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
        let path = genesis_path(home.as_ref());
        write(&path, &toml::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid("genesis chain_id cannot be empty".into()));
        }
        if self.initial_height == 0 {
            return Err(ConfigError::Invalid("initial_height must be at least 1".into()));
        }
        if self.validators.iter().any(|v| v.power <= 0) {
            return Err(ConfigError::Invalid(
                "genesis validators need positive power".into(),
            ));
        }
        Ok(())
    }
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(CONFIG_FILE)
}

pub fn genesis_path(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(GENESIS_FILE)
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::default();
        config.home = dir.path().to_path_buf();
        assert!(config.validate().is_ok());
        assert!(!config_path(dir.path()).exists());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::default();
        config.chain_id = "written".into();
        config.engine.block_interval_ms = 250;
        config.statesync.snapshot_interval = 7;
        config.write(dir.path()).unwrap();

        let raw = std::fs::read_to_string(config_path(dir.path())).unwrap();
        let mut loaded: NodeConfig = toml::from_str(&raw).unwrap();
        loaded.home = dir.path().to_path_buf();
        assert_eq!(loaded.chain_id, "written");
        assert_eq!(loaded.engine.block_interval_ms, 250);
        assert_eq!(loaded.statesync.snapshot_interval, 7);
        assert_eq!(loaded.http, config.http);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            chain_id = "partial"

            [engine]
            max_block_txs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.chain_id, "partial");
        assert_eq!(config.engine.max_block_txs, 3);
        assert_eq!(config.engine.block_interval_ms, 1000);
        assert_eq!(config.storage.backend, StoreBackend::File);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("CADENCE_CHAIN_ID", "from-env"),
            ("CADENCE_HTTP_PORT", "9000"),
            ("CADENCE_BLOCK_INTERVAL_MS", "50"),
        ]
        .into_iter()
        .collect();
        let mut config = NodeConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.chain_id, "from-env");
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.engine.block_interval_ms, 50);

        let err = config
            .apply_overrides(|k| (k == "CADENCE_HTTP_PORT").then(|| "high".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = NodeConfig::default();
        config.engine.block_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.chain_id = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_genesis_round_trip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = GenesisConfig::single_validator("g", "val-key");
        genesis.write(dir.path()).unwrap();
        assert_eq!(GenesisConfig::load(dir.path()).unwrap(), genesis);

        let bad = GenesisConfig {
            initial_height: 0,
            ..genesis
        };
        assert!(bad.validate().is_err());
        assert!(matches!(
            GenesisConfig::load(dir.path().join("missing")),
            Err(ConfigError::Io { .. })
        ));
    }
}
