//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "sync": { "rateLimitSeconds": 60, "statementDays": 31, ... },
//!   "rates": { "stalenessHours": 24, "retentionDays": 7, "pivotCurrency": "UAH" }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::adapters::monobank::BASE_URL_ENV;

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    sync: SyncSettings,
    #[serde(default)]
    rates: RateSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Remote sync tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Minimum interval between rate-limited remote calls
    pub rate_limit_seconds: u64,
    /// Extra wait after the remote service answers 429
    pub remote_backoff_seconds: u64,
    /// Trailing window fetched per statement task
    pub statement_days: u32,
    /// Default interval for `should_sync`
    pub throttle_minutes: u64,
    /// Ingest the public rate table at the start of each run
    pub refresh_rates_on_sync: bool,
    pub base_url: String,
    pub connect_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            rate_limit_seconds: 60,
            remote_backoff_seconds: 120,
            statement_days: 31,
            throttle_minutes: 60,
            refresh_rates_on_sync: true,
            base_url: "https://api.monobank.ua".to_string(),
            connect_timeout_seconds: 30,
            read_timeout_seconds: 60,
        }
    }
}

impl SyncSettings {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.rate_limit_seconds)
    }

    pub fn remote_backoff(&self) -> Duration {
        Duration::from_secs(self.remote_backoff_seconds)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_minutes * 60)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }
}

/// Exchange rate policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateSettings {
    /// Rates older than this are not used for resolution
    pub staleness_hours: i64,
    /// Rates older than this are deleted by cleanup
    pub retention_days: i64,
    /// Currency used for two-hop resolution
    pub pivot_currency: String,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            staleness_hours: 24,
            retention_days: 7,
            pivot_currency: "UAH".to_string(),
        }
    }
}

/// Wallet sync configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub sync: SyncSettings,
    pub rates: RateSettings,
    // Raw settings, kept so save() preserves unmanaged keys
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the data directory, then apply environment overrides
    ///
    /// A malformed settings file falls back to defaults with a warning.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", settings_path.display(), e);
                SettingsFile::default()
            })
        } else {
            SettingsFile::default()
        };

        let mut sync = raw.sync.clone();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                sync.base_url = base_url;
            }
        }

        Ok(Self {
            sync,
            rates: raw.rates.clone(),
            _raw_settings: raw,
        })
    }

    /// Save managed sections, preserving everything else in the file
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.sync = self.sync.clone();
        settings.rates = self.rates.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
