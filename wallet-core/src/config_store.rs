use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::types::TransactionQuery;
use crate::errors::{ControllerErrorCode, WalletError, WalletResult};
use crate::security::Environment;

const CONFIG_VERSION: u16 = 1;

pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 60;

/// Static wallet settings shared by the controller and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    /// Supported network identifiers, in display order.
    pub networks: Vec<String>,
    pub default_network: String,
    pub polling_interval_secs: u64,
    pub default_page_size: u32,
    pub environment: Environment,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl WalletConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            networks: vec!["mainnet".to_string(), "testnet".to_string()],
            default_network: "mainnet".to_string(),
            polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            default_page_size: TransactionQuery::DEFAULT_PAGE_SIZE,
            environment,
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    pub fn with_networks(mut self, networks: &[&str], default_network: &str) -> Self {
        self.networks = networks.iter().map(|n| n.to_string()).collect();
        self.default_network = default_network.to_string();
        self
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.networks.is_empty() {
            return Err(WalletError::controller(
                ControllerErrorCode::InvalidConfiguration,
                "At least one network must be configured",
            ));
        }
        if !self.networks.contains(&self.default_network) {
            return Err(WalletError::controller(
                ControllerErrorCode::InvalidConfiguration,
                format!(
                    "Default network '{}' is not among the configured networks",
                    self.default_network
                ),
            ));
        }
        if self.polling_interval_secs == 0 {
            return Err(WalletError::controller(
                ControllerErrorCode::InvalidConfiguration,
                "Polling interval must be positive",
            ));
        }
        if !(1..=100).contains(&self.default_page_size) {
            return Err(WalletError::controller(
                ControllerErrorCode::InvalidConfiguration,
                format!("Page size {} is out of range", self.default_page_size),
            ));
        }
        Ok(())
    }

    /// Apply `WALLET_*` environment overrides on top of the stored values.
    pub fn apply_env_overrides(&mut self) -> WalletResult<()> {
        if let Ok(value) = std::env::var("WALLET_ENV") {
            self.environment = Environment::parse_lossy(&value);
        }
        if let Ok(value) = std::env::var("WALLET_NETWORKS") {
            let networks: Vec<String> = value
                .split(',')
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(|item| item.to_string())
                .collect();
            if networks.is_empty() {
                return Err(WalletError::ValidationError(
                    "WALLET_NETWORKS cannot be an empty list".to_string(),
                ));
            }
            log::debug!("Network list overridden from environment: {:?}", networks);
            self.networks = networks;
        }
        if let Ok(value) = std::env::var("WALLET_DEFAULT_NETWORK") {
            self.default_network = value.trim().to_string();
        }
        if let Ok(value) = std::env::var("WALLET_POLLING_INTERVAL_SECS") {
            self.polling_interval_secs = value.trim().parse().map_err(|_| {
                WalletError::ValidationError(format!(
                    "Invalid numeric value '{}' for WALLET_POLLING_INTERVAL_SECS",
                    value
                ))
            })?;
        }
        self.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: WalletConfig,
    modified_at_unix: i64,
}

/// Handles persistence of wallet configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub const DEFAULT_FILENAME: &'static str = "wallet.config";

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::DEFAULT_FILENAME))
    }

    pub fn load_or_default(&self, environment: Environment) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            let config = WalletConfig::new(environment);
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        if checksum(&envelope.payload)? != envelope.checksum {
            return Err(WalletError::ValidationError(
                "Config integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.payload)
    }

    /// Load the stored configuration and layer environment overrides on top.
    /// Overrides are not written back.
    pub fn load_effective(&self, environment: Environment) -> WalletResult<WalletConfig> {
        let mut config = self.load_or_default(environment)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        config.validate()?;
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    pub fn update<F>(&self, environment: Environment, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default(environment)?;
        updater(&mut config)?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &WalletConfig) -> WalletResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(config)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_config_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(temp.path());

        let config = WalletConfig::new(Environment::Development)
            .with_networks(&["mainnet", "testnet", "devnet"], "devnet");
        store.save(&config).unwrap();

        let loaded = store.load_or_default(Environment::Development).unwrap();
        assert_eq!(loaded.networks.len(), 3);
        assert_eq!(loaded.default_network, "devnet");
    }

    #[test]
    fn tampered_config_detected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wallet.config");
        let store = ConfigStore::new(&path);
        store.save(&WalletConfig::new(Environment::Test)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"mainnet\"", "\"evilnet\"")).unwrap();

        let result = store.load_or_default(Environment::Test);
        assert!(matches!(result, Err(WalletError::ValidationError(_))));
    }

    #[test]
    fn update_rejects_invalid_default_network() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(temp.path());
        let result = store.update(Environment::Test, |config| {
            config.default_network = "devnet".to_string();
            Ok(())
        });
        let err = result.unwrap_err();
        assert!(err.is_controller(ControllerErrorCode::InvalidConfiguration));
    }
}
