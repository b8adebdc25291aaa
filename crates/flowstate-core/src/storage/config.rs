//! TOML-based application configuration.
//!
//! Stores the user-facing tuning knobs:
//! - Idle detection thresholds and hysteresis windows
//! - Break prediction toggle and default session length
//!
//! Configuration is stored at `~/.config/flowstate/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::{ConfigError, CoreError};

/// Idle-detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Score below which a tick counts toward idle.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold: u8,
    /// Sustained low-score seconds before idle is declared.
    #[serde(default = "default_idle_trigger_secs")]
    pub idle_trigger_secs: f64,
    /// Sustained recovery seconds before idle is cleared.
    #[serde(default = "default_recovery_secs")]
    pub recovery_secs: f64,
}

/// Break-prediction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prior for the optimal session length, in minutes, used until
    /// enough history exists to learn one.
    #[serde(default = "default_session_length_min")]
    pub default_session_length_min: f64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/flowstate/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
}

fn default_idle_threshold() -> u8 {
    30
}
fn default_idle_trigger_secs() -> f64 {
    10.0
}
fn default_recovery_secs() -> f64 {
    5.0
}
fn default_true() -> bool {
    true
}
fn default_session_length_min() -> f64 {
    50.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            idle_threshold: default_idle_threshold(),
            idle_trigger_secs: default_idle_trigger_secs(),
            recovery_secs: default_recovery_secs(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_session_length_min: default_session_length_min(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path,
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), CoreError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = lookup(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed
    /// to the field's type, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        set_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json)?;
        self.save()?;
        Ok(())
    }
}

fn lookup<'a>(root: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    if key.is_empty() {
        return None;
    }
    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn set_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<(), ConfigError> {
    let Some((parent_path, leaf)) = split_leaf(key) else {
        return Err(ConfigError::UnknownKey(key.to_string()));
    };

    let mut current = &mut *root;
    for part in parent_path {
        current = current
            .get_mut(part)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    }
    let obj = current
        .as_object_mut()
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    let existing = obj
        .get(leaf)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };
    let new_value = match existing {
        serde_json::Value::Bool(_) => serde_json::Value::Bool(
            value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
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
        _ => serde_json::Value::String(value.into()),
    };

    obj.insert(leaf.to_string(), new_value);
    Ok(())
}

fn split_leaf(key: &str) -> Option<(Vec<&str>, &str)> {
    let mut parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let leaf = parts.pop()?;
    Some((parts, leaf))
}
