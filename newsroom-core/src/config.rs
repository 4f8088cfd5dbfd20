use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::NEWSROOM_TZ;
use crate::error::ConfigError;
use crate::transitions::TransitionPolicy;

/// Upper bound for `purge.retentionDays`, about a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowConfig {
    pub sweep: SweepConfig,
    pub purge: PurgeConfig,
    pub store: StoreConfig,
    pub transition_policy: TransitionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SweepConfig {
    pub interval_secs: u64,
    /// IANA name of the zone schedule entries are written in.
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PurgeConfig {
    pub enabled: bool,
    /// Hour of day (0-23, sweep zone) at which old articles are purged.
    pub hour: u32,
    pub retention_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Directory holding `articles.json`. Defaults to the config directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            time_zone: NEWSROOM_TZ.name().to_owned(),
        }
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 1,
            retention_days: 90,
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn zone(&self) -> Result<Tz, ConfigError> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimeZone(self.time_zone.clone()))
    }
}

impl PurgeConfig {
    /// Retention window, clamped to `0..=MAX_RETENTION_DAYS` days.
    pub fn retention(&self) -> chrono::Duration {
        let days = self.retention_days.clamp(0, MAX_RETENTION_DAYS);
        if days != self.retention_days {
            warn!(configured = self.retention_days, used = days, "retention days out of range");
        }
        chrono::Duration::days(days)
    }

    pub fn run_hour(&self) -> u32 {
        self.hour.min(23)
    }
}

impl WorkflowConfig {
    /// `<config dir>/newsroom`, created if missing.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        let dir = base.join("newsroom");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Loads the user config, or writes and returns the defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        let path = match Self::config_file_path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "no config location, using defaults");
                return Self::default();
            }
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "could not load config, using defaults");
                let config = Self::default();
                if let Err(save_err) = config.save_to(&path) {
                    warn!(error = %save_err, "could not save default config");
                }
                config
            }
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: WorkflowConfig = serde_json::from_str(&content)?;
        config.sweep.zone()?;
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Where the article store lives.
    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.store.data_dir {
            Some(dir) => dir.clone(),
            None => Self::config_dir()?,
        };
        Ok(dir.join("articles.json"))
    }
}
