//! TOML-based application configuration.
//!
//! Stores the backend endpoint and bearer credential plus the attempt
//! engine knobs (autosave period, fullscreen enforcement, tab-switch
//! tolerance).
//!
//! Configuration is stored at `~/.config/examroom/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::attempt::AttemptTuning;
use crate::error::ConfigError;

/// Persistence/catalog service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer credential supplied by the external auth flow.
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Bound on the final submit call; on timeout the attempt reverts
    /// to Active and stays retryable.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".into()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_submit_timeout() -> u64 {
    15
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bearer_token: String::new(),
            request_timeout_secs: default_request_timeout(),
            submit_timeout_secs: default_submit_timeout(),
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/examroom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub attempt: AttemptTuning,
}

impl Config {
    pub fn path() -> PathBuf {
        data_dir()
            .map(|d| d.join("config.toml"))
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// Load from disk, falling back to defaults on any failure.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &PathBuf) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(path, text).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Look up a value by dotted path, e.g. `backend.base_url`.
    pub fn get(&self, key: &str) -> Option<String> {
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(match current {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Set a value by dotted path, parsing `value` against the existing
    /// type at that path.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut root =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = &mut root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let invalid = |e: &dyn std::fmt::Display| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                };
                let new_value = match existing {
                    serde_json::Value::Bool(_) => {
                        serde_json::Value::Bool(value.parse::<bool>().map_err(|e| invalid(&e))?)
                    }
                    serde_json::Value::Number(_) => {
                        serde_json::Value::Number(value.parse::<u64>().map_err(|e| invalid(&e))?.into())
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.to_string()),
                    _ => return Err(invalid(&"composite keys cannot be set directly")),
                };
                obj.insert(part.to_string(), new_value);
            } else {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            }
        }

        *self = serde_json::from_value(root).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        self.save()?;
        Ok(())
    }
}
