//! Configuration for the exchange service

use crate::fee::FeeConfig;
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Owner set at construction (only used when no snapshot exists)
    pub owner: String,

    /// Initial fee parameters
    pub fees: FeeSettings,

    /// Engine actor configuration
    pub actor: ActorConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Log and metrics settings
    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/exchange"),
            service_name: "exchange-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            owner: "owner".to_string(),
            fees: FeeSettings::default(),
            actor: ActorConfig::default(),
            rocksdb: RocksDBConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Initial fee parameters, validated like a fee update
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSettings {
    /// Fee factor, 1..=9
    pub factor: u8,

    /// Scale exponent, 2..=18
    pub scale_exponent: u8,

    /// Exit multiplier
    pub exit_multiplier: u32,
}

impl Default for FeeSettings {
    fn default() -> Self {
        let fee = FeeConfig::default();
        Self {
            factor: fee.factor(),
            scale_exponent: fee.scale_exponent(),
            exit_multiplier: fee.exit_multiplier(),
        }
    }
}

/// Engine actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox capacity
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Log and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Emit JSON log lines
    pub json_logs: bool,

    /// Record Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("EXCHANGE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(owner) = std::env::var("EXCHANGE_OWNER") {
            config.owner = owner;
        }

        if let Ok(factor) = std::env::var("EXCHANGE_FEE_FACTOR") {
            config.fees.factor = parse_env("EXCHANGE_FEE_FACTOR", &factor)?;
        }

        if let Ok(decimals) = std::env::var("EXCHANGE_FEE_DECIMALS") {
            config.fees.scale_exponent = parse_env("EXCHANGE_FEE_DECIMALS", &decimals)?;
        }

        if let Ok(multiplier) = std::env::var("EXCHANGE_EXIT_MULTIPLIER") {
            config.fees.exit_multiplier = parse_env("EXCHANGE_EXIT_MULTIPLIER", &multiplier)?;
        }

        if let Ok(json) = std::env::var("EXCHANGE_JSON_LOGS") {
            config.telemetry.json_logs = parse_env("EXCHANGE_JSON_LOGS", &json)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check owner and initial fee parameters
    pub fn validate(&self) -> crate::Result<()> {
        if self.owner.trim().is_empty() {
            return Err(crate::Error::Config("owner must not be empty".to_string()));
        }
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be positive".to_string(),
            ));
        }
        self.fee_config()?;
        Ok(())
    }

    /// Owner account
    pub fn owner_account(&self) -> AccountId {
        AccountId::new(self.owner.clone())
    }

    /// Initial fee configuration
    pub fn fee_config(&self) -> crate::Result<FeeConfig> {
        FeeConfig::new(
            self.fees.factor,
            self.fees.scale_exponent,
            self.fees.exit_multiplier,
        )
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::Config(format!("{} has invalid value {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, FeeField};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "exchange-core");
        assert_eq!(config.fee_config().unwrap(), FeeConfig::default());
        assert!(config.telemetry.metrics_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.toml");
        let mut config = Config::default();
        config.owner = "treasury".to_string();
        config.fees.factor = 5;
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.owner_account(), AccountId::new("treasury"));
        assert_eq!(loaded.fee_config().unwrap().factor(), 5);
    }

    #[test]
    fn test_invalid_fee_settings_rejected() {
        let mut config = Config::default();
        config.fees.scale_exponent = 19;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidFeeConfig {
                field: FeeField::Decimals,
                value: 19
            })
        ));
    }

    #[test]
    fn test_empty_owner_rejected() {
        let mut config = Config::default();
        config.owner = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
