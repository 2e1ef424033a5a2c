//! Client configuration.
//!
//! Values come from environment variables, falling back to defaults suitable
//! for a local development server.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use slotbook_observability::LogFormat;

pub const ENV_API_URL: &str = "SLOTBOOK_API_URL";
pub const ENV_DATA_DIR: &str = "SLOTBOOK_DATA_DIR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SLOTBOOK_REQUEST_TIMEOUT_SECS";
pub const ENV_LOG_FORMAT: &str = "SLOTBOOK_LOG_FORMAT";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the SlotBook API (no trailing path).
    pub api_url: String,

    /// Directory holding the client database.
    pub data_dir: PathBuf,

    /// Timeout applied to every HTTP request to the API.
    pub request_timeout_secs: u64,

    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: default_data_dir(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_format: LogFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api_url = url;
        }

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            if dir.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    var: ENV_DATA_DIR,
                    reason: "must not be empty".to_string(),
                });
            }
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs = match secs.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: ENV_REQUEST_TIMEOUT_SECS,
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Ok(secs) => secs,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: ENV_REQUEST_TIMEOUT_SECS,
                        reason: e.to_string(),
                    });
                }
            };
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log_format = format.parse().map_err(|e: slotbook_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    var: ENV_LOG_FORMAT,
                    reason: e.to_string(),
                }
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: ENV_API_URL,
                reason: format!("'{}' is not an http(s) URL", self.api_url),
            });
        }
        Ok(())
    }

    /// Path of the SQLite database holding the persisted token.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("client.db")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `{app_data_dir}/slotbook`, or `~/.local/share/slotbook` when the OS does
/// not report a data directory.
fn default_data_dir() -> PathBuf {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .unwrap_or_else(|| PathBuf::from("."));
    dir.push("slotbook");
    dir
}
