//! Application configuration management.
//!
//! Holds the auth service location, where the credential is stored, and the
//! routes used for navigation after login, logout and denied access.
//!
//! Configuration is stored at `~/.config/sessiongate/config.json`. Missing
//! files and missing fields fall back to defaults; `SESSIONGATE_API_URL` and
//! `SESSIONGATE_STORAGE` override the file when set.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sessiongate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:7000/api/auth";

/// Name of the single credential slot
const DEFAULT_CREDENTIAL_KEY: &str = "auth_token";

/// HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "SESSIONGATE_API_URL";
pub const ENV_STORAGE: &str = "SESSIONGATE_STORAGE";

/// Where the credential lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
    Disabled,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Keyring => "keyring",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage: StorageBackend,
    /// Overrides the cache directory used by the file backend
    pub storage_dir: Option<PathBuf>,
    pub credential_key: String,
    /// Where a successful login lands
    pub authenticated_route: String,
    /// Where logout and denied navigation land
    pub unauthenticated_route: String,
    pub request_timeout_secs: u64,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            storage_dir: None,
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            authenticated_route: "/dashboard".to_string(),
            unauthenticated_route: "/login".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_email: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record the last login email in the config file.
    ///
    /// Works on the file as stored, so environment overrides applied by
    /// `load` never leak into it.
    pub fn remember_email(email: &str) -> Result<()> {
        Self::remember_email_at(&Self::config_path()?, email)
    }

    pub fn remember_email_at(path: &Path, email: &str) -> Result<()> {
        let mut stored = Self::load_from(path)?;
        stored.last_email = Some(email.to_string());
        stored.save_to(path)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(storage) = std::env::var(ENV_STORAGE) {
            self.storage = storage
                .parse()
                .with_context(|| format!("Invalid {}", ENV_STORAGE))?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed credential
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
