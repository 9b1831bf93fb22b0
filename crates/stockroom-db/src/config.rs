//! # Stockroom Configuration
//!
//! Configuration for the database pool and the checkout processor.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKROOM_DATABASE_PATH=/var/lib/stockroom/stockroom.db            │
//! │     STOCKROOM_VAT_RATE=0.2                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     explicit path, or the platform config dir:                         │
//! │     ~/.config/stockroom/stockroom.toml (Linux)                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     data-dir database, VAT 0.2, 10-character receipt numbers           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/stockroom/stockroom.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [checkout]
//! vat_rate = "0.2"
//! receipt_number_length = 10
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use stockroom_core::{VatRate, RECEIPT_NUMBER_LENGTH};

use crate::error::ConfigError;
use crate::pool::DbConfig;

const CONFIG_FILE: &str = "stockroom.toml";
const DATABASE_FILE: &str = "stockroom.db";

// =============================================================================
// Database Settings
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. `None` means the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long a writer waits for the write lock.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// The configured path, or `stockroom.db` in the platform data dir.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "stockroom", "stockroom")
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
        })
    }

    /// Builds the pool configuration.
    pub fn to_db_config(&self) -> Result<DbConfig, ConfigError> {
        let path = self.resolved_path().ok_or(ConfigError::NoPath)?;

        Ok(DbConfig::new(path)
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs)))
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// `[checkout]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// VAT applied when a checkout request carries no override.
    #[serde(default = "default_vat_rate")]
    pub vat_rate: VatRate,

    #[serde(default = "default_receipt_number_length")]
    pub receipt_number_length: usize,
}

fn default_vat_rate() -> VatRate {
    // 20%
    VatRate::new(Decimal::new(2, 1)).unwrap_or_default()
}

fn default_receipt_number_length() -> usize {
    RECEIPT_NUMBER_LENGTH
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            vat_rate: default_vat_rate(),
            receipt_number_length: default_receipt_number_length(),
        }
    }
}

// =============================================================================
// Stockroom Config
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockroomConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,
}

impl StockroomConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`stockroom.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reads and parses one TOML file without overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if !(6..=64).contains(&self.checkout.receipt_number_length) {
            return Err(ConfigError::Invalid(format!(
                "checkout.receipt_number_length must be between 6 and 64, got {}",
                self.checkout.receipt_number_length
            )));
        }

        Ok(())
    }

    /// Applies `STOCKROOM_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STOCKROOM_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(max) = std::env::var("STOCKROOM_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid STOCKROOM_MAX_CONNECTIONS"),
            }
        }

        if let Ok(secs) = std::env::var("STOCKROOM_BUSY_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.database.busy_timeout_secs = n,
                Err(_) => warn!(value = %secs, "Ignoring invalid STOCKROOM_BUSY_TIMEOUT_SECS"),
            }
        }

        if let Ok(rate) = std::env::var("STOCKROOM_VAT_RATE") {
            match Decimal::from_str(rate.trim()).ok().map(VatRate::new) {
                Some(Ok(parsed)) => {
                    debug!(vat_rate = %rate, "Overriding VAT rate from environment");
                    self.checkout.vat_rate = parsed;
                }
                _ => warn!(value = %rate, "Ignoring invalid STOCKROOM_VAT_RATE"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockroom", "stockroom")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }
}
