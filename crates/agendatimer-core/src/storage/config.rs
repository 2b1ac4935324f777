//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Countdown tick period, warning window and overtime reminder interval
//! - Alert volume and repeat pattern
//! - Notification and mirror behaviour
//! - Session chaining flags
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result};

/// Countdown engine timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    /// Fraction of the duration left when the warning fires.
    #[serde(default = "default_warning_fraction")]
    pub warning_fraction: f64,
    /// Interval between end-alert reminders while in overtime.
    #[serde(default = "default_overtime_repeat_ms")]
    pub overtime_repeat_ms: u64,
}

/// Alert sound configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_50")]
    pub volume: u32,
    #[serde(default = "default_warning_repeat_count")]
    pub warning_repeat_count: u32,
    #[serde(default = "default_end_repeat_count")]
    pub end_repeat_count: u32,
    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Mirror surface configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_true")]
    pub close_on_stop: bool,
    /// Progress movement below this many points does not trigger a push.
    #[serde(default = "default_progress_threshold_pct")]
    pub progress_threshold_pct: f64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    /// Start the next unfinished block when a countdown ends.
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    /// Mark the finished block done before advancing.
    #[serde(default = "default_true")]
    pub mark_done_on_complete: bool,
}

// Default functions
fn default_tick_period_ms() -> u64 {
    250
}
fn default_warning_fraction() -> f64 {
    0.10
}
fn default_overtime_repeat_ms() -> u64 {
    5 * 60 * 1000
}
fn default_true() -> bool {
    true
}
fn default_50() -> u32 {
    50
}
fn default_warning_repeat_count() -> u32 {
    1
}
fn default_end_repeat_count() -> u32 {
    3
}
fn default_repeat_interval_ms() -> u64 {
    1000
}
fn default_progress_threshold_pct() -> f64 {
    1.0
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            warning_fraction: default_warning_fraction(),
            overtime_repeat_ms: default_overtime_repeat_ms(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 50,
            warning_repeat_count: default_warning_repeat_count(),
            end_repeat_count: default_end_repeat_count(),
            repeat_interval_ms: default_repeat_interval_ms(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            close_on_stop: true,
            progress_threshold_pct: default_progress_threshold_pct(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            countdown: CountdownConfig::default(),
            alerts: AlertsConfig::default(),
            notifications: NotificationsConfig::default(),
            mirror: MirrorConfig::default(),
            auto_advance: true,
            mark_done_on_complete: true,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<()> {
        let unknown = || CoreError::from(ConfigError::UnknownKey(key.to_string()));
        let invalid = |message: String| {
            CoreError::from(ConfigError::InvalidValue {
                key: key.to_string(),
                message,
            })
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory or return (and write) defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Returns error if key is unknown or the
    /// value does not match the existing type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Flattened `key = value` pairs, sorted by key.
    pub fn list(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out.sort();
        out
    }
}
