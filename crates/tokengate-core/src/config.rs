//! Session configuration.
//!
//! A `SessionConfig` names the remote endpoint paths used for verification and
//! refresh, the storage keys credentials are mirrored under, and whether a
//! restored credential is checked remotely on startup.
//!
//! Configuration is supplied as a `PartialSessionConfig` (usually parsed from
//! `~/.config/tokengate/config.json`) and merged over the documented defaults.
//! Once built it is never mutated; changing it means building a new session.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "tokengate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_VERIFY_PATH: &str = "/auth/verify";
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";
pub const DEFAULT_REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const DEFAULT_USER_KEY: &str = "auth_user";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Verify endpoint path must not be empty")]
    MissingVerifyPath,

    #[error("Refresh endpoint path must not be empty when set")]
    EmptyRefreshPath,

    #[error("Token storage key must not be empty")]
    MissingTokenKey,
}

/// Remote endpoint paths, relative to the HTTP client's base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPaths {
    pub verify: String,
    /// Absent disables every refresh path.
    pub refresh: Option<String>,
}

/// Durable store key names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageKeys {
    pub token_key: String,
    pub refresh_token_key: Option<String>,
    pub user_key: Option<String>,
}

impl StorageKeys {
    /// Every configured key, in the order they are written.
    pub fn configured(&self) -> Vec<&str> {
        std::iter::once(self.token_key.as_str())
            .chain(self.refresh_token_key.as_deref())
            .chain(self.user_key.as_deref())
            .filter(|key| !key.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub endpoints: EndpointPaths,
    pub storage: StorageKeys,
    pub auto_verify: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointPaths {
                verify: DEFAULT_VERIFY_PATH.to_string(),
                refresh: None,
            },
            storage: StorageKeys {
                token_key: DEFAULT_TOKEN_KEY.to_string(),
                refresh_token_key: Some(DEFAULT_REFRESH_TOKEN_KEY.to_string()),
                user_key: Some(DEFAULT_USER_KEY.to_string()),
            },
            auto_verify: true,
        }
    }
}

impl SessionConfig {
    /// Merge a partial configuration over the defaults and validate it.
    pub fn from_partial(partial: PartialSessionConfig) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(endpoints) = partial.endpoints {
            if let Some(verify) = endpoints.verify {
                config.endpoints.verify = verify;
            }
            if let Some(refresh) = endpoints.refresh {
                config.endpoints.refresh = Some(refresh);
            }
        }

        if let Some(storage) = partial.storage {
            if let Some(token_key) = storage.token_key {
                config.storage.token_key = token_key;
            }
            // An explicit empty name turns the optional key off
            if let Some(key) = storage.refresh_token_key {
                config.storage.refresh_token_key = non_empty(key);
            }
            if let Some(key) = storage.user_key {
                config.storage.user_key = non_empty(key);
            }
        }

        if let Some(auto_verify) = partial.auto_verify {
            config.auto_verify = auto_verify;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.verify.trim().is_empty() {
            return Err(ConfigError::MissingVerifyPath);
        }
        if matches!(self.endpoints.refresh.as_deref(), Some(path) if path.trim().is_empty()) {
            return Err(ConfigError::EmptyRefreshPath);
        }
        if self.storage.token_key.is_empty() {
            return Err(ConfigError::MissingTokenKey);
        }
        Ok(())
    }

    /// Load a partial configuration from a JSON file and merge it over the
    /// defaults. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let partial = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            PartialSessionConfig::default()
        };
        Ok(Self::from_partial(partial)?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Whether the refresh path is usable at all.
    pub fn refresh_enabled(&self) -> bool {
        self.endpoints.refresh.is_some()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Configuration as supplied by the caller; every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialSessionConfig {
    pub endpoints: Option<PartialEndpointPaths>,
    pub storage: Option<PartialStorageKeys>,
    pub auto_verify: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialEndpointPaths {
    pub verify: Option<String>,
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialStorageKeys {
    pub token_key: Option<String>,
    pub refresh_token_key: Option<String>,
    pub user_key: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
