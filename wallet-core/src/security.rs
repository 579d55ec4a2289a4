use crate::errors::{WalletError, WalletResult};
use crate::storage::KdfParameters;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const KEY_KDF_MEMORY_KIB: &str = "KDF_MEMORY_KIB";
const KEY_KDF_TIME_COST: &str = "KDF_TIME_COST";
const KEY_KDF_PARALLELISM: &str = "KDF_PARALLELISM";
const KEY_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
const KEY_STATISTICS_URL: &str = "STATISTICS_URL";

/// Environment types for different security configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    /// Parse an environment name, falling back to development.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        }
    }

    /// Read `WALLET_ENV`.
    pub fn from_env() -> Self {
        std::env::var("WALLET_ENV")
            .map(|value| Self::parse_lossy(&value))
            .unwrap_or(Environment::Development)
    }

    /// Argon2 profile used when sealing secrets in this environment.
    pub fn kdf_parameters(&self) -> KdfParameters {
        match self {
            Environment::Production => KdfParameters::strong(),
            Environment::Development => KdfParameters::interactive(),
            Environment::Test => KdfParameters::minimal(),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
            Environment::Test => write!(f, "test"),
        }
    }
}

/// Security-sensitive tunables keyed by name, with per-environment defaults
/// and `WALLET_*` environment variable overrides.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    environment: Environment,
    config_map: HashMap<String, String>,
}

impl SecurityConfig {
    /// Create a new security configuration
    pub fn new(environment: Environment) -> Self {
        let mut config = SecurityConfig {
            environment,
            config_map: HashMap::new(),
        };

        config.load_defaults();
        config
    }

    /// Load configuration from environment variables
    pub fn from_env() -> WalletResult<Self> {
        Self::from_environment(Environment::from_env())
    }

    /// Construct a configuration for the provided environment and apply overrides.
    pub fn from_environment(environment: Environment) -> WalletResult<Self> {
        let mut config = Self::new(environment);
        config.load_from_env_vars();
        config.validate()?;
        Ok(config)
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.config_map.get(key)
    }

    /// Set a configuration value (for testing purposes)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config_map.insert(key.into(), value.into());
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Argon2 parameters, environment profile overridden by explicit keys.
    pub fn kdf_parameters(&self) -> WalletResult<KdfParameters> {
        let profile = self.environment.kdf_parameters();
        let params = KdfParameters {
            m_cost_kib: self.get_u32_with_default(KEY_KDF_MEMORY_KIB, profile.m_cost_kib)?,
            t_cost: self.get_u32_with_default(KEY_KDF_TIME_COST, profile.t_cost)?,
            p_cost: self.get_u32_with_default(KEY_KDF_PARALLELISM, profile.p_cost)?,
        };

        if params.p_cost == 0 || params.t_cost == 0 {
            return Err(WalletError::ValidationError(
                "KDF time cost and parallelism must be positive".to_string(),
            ));
        }
        // Argon2 requires at least 8 KiB per lane.
        if params.m_cost_kib < 8 * params.p_cost {
            return Err(WalletError::ValidationError(format!(
                "KDF memory {} KiB is below the minimum for {} lanes",
                params.m_cost_kib, params.p_cost
            )));
        }
        if self.is_production() && params.m_cost_kib < KdfParameters::interactive().m_cost_kib {
            return Err(WalletError::ValidationError(
                "Production KDF memory cost is too low".to_string(),
            ));
        }
        Ok(params)
    }

    pub fn request_timeout(&self) -> WalletResult<Duration> {
        let secs = self.get_u32_with_default(KEY_REQUEST_TIMEOUT_SECS, 10)?;
        if secs == 0 {
            return Err(WalletError::ValidationError(
                "Request timeout must be positive".to_string(),
            ));
        }
        Ok(Duration::from_secs(u64::from(secs)))
    }

    /// Base URL of the node-list service.
    pub fn statistics_url(&self) -> Option<&str> {
        self.config_map.get(KEY_STATISTICS_URL).map(String::as_str)
    }

    fn get_u32_with_default(&self, key: &str, default: u32) -> WalletResult<u32> {
        match self.config_map.get(key) {
            Some(value) => parse_u32_value(value, key),
            None => Ok(default),
        }
    }

    fn validate(&self) -> WalletResult<()> {
        self.kdf_parameters()?;
        self.request_timeout()?;
        if let Some(url) = self.statistics_url() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(WalletError::ValidationError(format!(
                    "Statistics URL '{}' must be http(s)",
                    url
                )));
            }
            if self.is_production() && url.starts_with("http://") {
                return Err(WalletError::ValidationError(
                    "Production statistics URL must use https".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn load_defaults(&mut self) {
        let timeout = match self.environment {
            Environment::Production => "15",
            Environment::Development => "10",
            Environment::Test => "2",
        };
        self.config_map
            .insert(KEY_REQUEST_TIMEOUT_SECS.to_string(), timeout.to_string());
    }

    fn load_from_env_vars(&mut self) {
        let env_mappings = [
            ("WALLET_KDF_MEMORY_KIB", KEY_KDF_MEMORY_KIB),
            ("WALLET_KDF_TIME_COST", KEY_KDF_TIME_COST),
            ("WALLET_KDF_PARALLELISM", KEY_KDF_PARALLELISM),
            ("WALLET_REQUEST_TIMEOUT_SECS", KEY_REQUEST_TIMEOUT_SECS),
            ("WALLET_STATISTICS_URL", KEY_STATISTICS_URL),
        ];

        for (env_var, config_key) in &env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                if value.trim().is_empty() {
                    log::warn!("Environment variable {} is empty", env_var);
                    continue;
                }

                if value.chars().any(|c| c.is_control()) {
                    log::warn!(
                        "Environment variable {} contains control characters, ignoring",
                        env_var
                    );
                    continue;
                }

                self.config_map.insert(config_key.to_string(), value);
                log::debug!(
                    "Loaded configuration {} from environment variable {}",
                    config_key,
                    env_var
                );
            }
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::new(Environment::Development)
    }
}

fn parse_u32_value(value: &str, key: &str) -> WalletResult<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WalletError::ValidationError(format!(
            "Configuration key '{}' cannot be empty",
            key
        )));
    }

    trimmed.parse::<u32>().map_err(|_| {
        WalletError::ValidationError(format!(
            "Invalid numeric value '{}' for key '{}'",
            value, key
        ))
    })
}

/// Global security configuration instance
static SECURITY_CONFIG: OnceCell<SecurityConfig> = OnceCell::new();

/// Initialize the process-wide configuration for a specific environment.
/// Later calls return the first configuration.
pub fn init_security_config(environment: Environment) -> WalletResult<&'static SecurityConfig> {
    SECURITY_CONFIG.get_or_try_init(|| {
        let config = SecurityConfig::from_environment(environment)?;
        log::info!(
            "Security configuration initialized for {} environment",
            config.environment
        );
        Ok(config)
    })
}

/// Get global security configuration, initializing it from `WALLET_ENV`
/// when nobody did so explicitly.
pub fn security_config() -> WalletResult<&'static SecurityConfig> {
    match SECURITY_CONFIG.get() {
        Some(config) => Ok(config),
        None => init_security_config(Environment::from_env()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_selects_kdf_profile() {
        let config = SecurityConfig::new(Environment::Test);
        assert_eq!(config.kdf_parameters().unwrap(), KdfParameters::minimal());

        let config = SecurityConfig::new(Environment::Production);
        assert_eq!(config.kdf_parameters().unwrap(), KdfParameters::strong());
    }

    #[test]
    fn explicit_keys_override_profile() {
        let mut config = SecurityConfig::new(Environment::Development);
        config.set(KEY_KDF_TIME_COST, "3");
        assert_eq!(config.kdf_parameters().unwrap().t_cost, 3);

        config.set(KEY_KDF_MEMORY_KIB, "4");
        assert!(matches!(
            config.kdf_parameters(),
            Err(WalletError::ValidationError(_))
        ));
    }

    #[test]
    fn production_rejects_weak_settings() {
        let mut config = SecurityConfig::new(Environment::Production);
        config.set(KEY_KDF_MEMORY_KIB, "1024");
        assert!(config.kdf_parameters().is_err());

        let mut config = SecurityConfig::new(Environment::Production);
        config.set(KEY_STATISTICS_URL, "http://stats.local");
        assert!(config.validate().is_err());
    }

    #[test]
    fn environment_names_parse_leniently() {
        assert_eq!(Environment::parse_lossy("PROD"), Environment::Production);
        assert_eq!(Environment::parse_lossy("testing"), Environment::Test);
        assert_eq!(Environment::parse_lossy("staging"), Environment::Development);
    }
}
