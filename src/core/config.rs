use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Application settings, persisted as `settings.json`.
/// Missing fields fall back to their defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Seconds between random alarm injections.
    pub alarm_interval_secs: u64,
    /// Seconds between battery drift passes.
    pub drift_interval_secs: u64,
    /// Inclusive upper bound of the per-pass battery decrement.
    pub max_drift: u8,
    /// Drift at or below this level marks a plot `LowBattery`.
    pub low_battery_threshold: u8,
    /// Battery taken by a manual discharge.
    pub discharge_step: u8,
    /// Per-plot history cap.
    pub history_capacity: usize,
    /// Demo population created by the binary at startup.
    pub seed_plots: usize,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alarm_interval_secs: 600,
            drift_interval_secs: 300,
            max_drift: 2,
            low_battery_threshold: 20,
            discharge_step: 50,
            history_capacity: 500,
            seed_plots: 0,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn alarm_interval(&self) -> Duration {
        Duration::from_secs(self.alarm_interval_secs)
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_secs(self.drift_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alarm_interval_secs == 0 {
            return Err(invalid("alarm_interval_secs", "must be positive"));
        }
        if self.drift_interval_secs == 0 {
            return Err(invalid("drift_interval_secs", "must be positive"));
        }
        if self.low_battery_threshold > 100 {
            return Err(invalid("low_battery_threshold", "must be within 0..=100"));
        }
        if self.discharge_step == 0 {
            return Err(invalid("discharge_step", "must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    /// Load settings, falling back to defaults when the file is missing,
    /// unreadable or invalid.
    pub fn load(&self) -> Settings {
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "Ignoring settings at {:?}, using defaults: {}",
                    self.config_path, e
                );
                Settings::default()
            }
        }
    }

    /// Like [`ConfigManager::load`] but reports why a present file was rejected.
    pub fn try_load(&self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&self.config_path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }
}
