//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, request timeout, where the session is
//! stored, and the last used username.
//!
//! Configuration is stored at `~/.config/haulbook/config.json`. The
//! `HAULBOOK_API_URL` and `HAULBOOK_TIMEOUT_SECS` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    SessionService,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "haulbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Hosted API used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "https://kodaklogisticsapi.up.railway.app/api/";

/// HTTP request timeout in seconds.
/// The only timeout on any operation; there is no per-call deadline on top of it.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const ENV_API_URL: &str = "HAULBOOK_API_URL";
const ENV_TIMEOUT_SECS: &str = "HAULBOOK_TIMEOUT_SECS";

/// Where the session record lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the user config directory, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_TIMEOUT_SECS).ok(),
        );
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

    pub fn apply_overrides(&mut self, api_url: Option<String>, timeout_secs: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = timeout_secs {
            match raw.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the session file for the file backend
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Base URL with exactly one trailing slash
    pub fn base_url(&self) -> String {
        format!("{}/", self.api_base_url.trim_end_matches('/'))
    }

    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")
    }

    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::File => Arc::new(FileCredentialStore::new(self.data_dir()?)),
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()?),
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        };
        Ok(store)
    }

    /// Wire up the session service described by this config
    pub fn session_service(&self) -> Result<SessionService> {
        Ok(SessionService::new(
            self.http_client()?,
            self.base_url(),
            self.credential_store()?,
        ))
    }
}
