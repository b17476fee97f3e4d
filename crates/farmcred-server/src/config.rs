use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use farmcred_identity::IdentityConfig;
use farmcred_media::PhotoRules;
use farmcred_workflow::{DEFAULT_SEARCH_RADIUS_KM, WorkflowConfig};

/// Top-level configuration for the FarmCred server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmCredConfig {
    /// Address the HTTP API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Persist requests, agents and the audit trail to `state.json`.
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Seconds between checks for visits that are due to start.
    #[serde(default = "default_scheduler_interval_secs")]
    pub scheduler_interval_secs: u64,

    /// Seconds between status polls on a watch stream.
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,

    /// Radius used when looking for agents near a farm.
    #[serde(default = "default_search_radius_km")]
    pub search_radius_km: f64,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub photos: PhotoRules,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// Object storage for uploaded photos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Uploads are disabled until a key is set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_geocoding_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_persist() -> bool {
    true
}

fn default_scheduler_interval_secs() -> u64 {
    60
}

fn default_watch_interval_secs() -> u64 {
    30
}

fn default_search_radius_km() -> f64 {
    DEFAULT_SEARCH_RADIUS_KM
}

fn default_api_base_url() -> String {
    "https://api.farmcred.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_geocoding_timeout_secs() -> u64 {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_geocoding_timeout_secs(),
        }
    }
}

impl Default for FarmCredConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            persist: default_persist(),
            scheduler_interval_secs: default_scheduler_interval_secs(),
            watch_interval_secs: default_watch_interval_secs(),
            search_radius_km: default_search_radius_km(),
            workflow: WorkflowConfig::default(),
            identity: IdentityConfig::default(),
            photos: PhotoRules::default(),
            storage: StorageConfig::default(),
            geocoding: GeocodingConfig::default(),
        }
    }
}

impl FarmCredConfig {
    /// Config file path within the state directory.
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// `$FARMCRED_STATE_DIR`, or `~/.farmcred/`.
    pub fn default_state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("FARMCRED_STATE_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".farmcred")
        }
    }

    /// Load config from `path`. Returns default if not found.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Take API keys from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override API keys with non-empty values returned by `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(key) = get("FARMCRED_NIN_API_KEY") {
            self.identity.nin_api_key = Some(key);
        }
        if let Some(key) = get("FARMCRED_BVN_API_KEY") {
            self.identity.bvn_api_key = Some(key);
        }
        if let Some(key) = get("FARMCRED_STORAGE_API_KEY") {
            self.storage.api_key = Some(key);
        }
    }
}
