//! Application configuration management.
//!
//! This module handles loading and saving the client configuration,
//! which includes the API base URL, the organization id, and the last
//! used username.
//!
//! Configuration is stored at `~/.config/coffer/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "coffer";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Sealed session file name in the data directory
const SESSION_FILE: &str = "session.sealed";

/// Default API base URL, overridable per deployment
const DEFAULT_BASE_URL: &str = "https://api.coffer.app";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub organization_id: Option<String>,
    pub last_username: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            organization_id: None,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the sealed session file lives for this installation
    pub fn session_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSION_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let parsed: Config = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(parsed.base_url, DEFAULT_BASE_URL);
        assert!(parsed.organization_id.is_none());
        assert!(parsed.last_username.is_none());
    }
}
