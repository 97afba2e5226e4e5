//! followgraph configuration file handling
//!
//! Loads ~/.config/followgraph/config.yaml. Every section has defaults, so a
//! missing file or a partial file is valid.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables consulted for the API token after `token_env`
const FALLBACK_TOKEN_ENVS: [&str; 2] = ["GITHUB_TOKEN", "GITHUB_PERSONAL_ACCESS_TOKEN"];

/// GitHub connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubSettings {
    /// REST API base URL (GitHub Enterprise uses `https://host/api/v3`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the personal access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Authenticated login; detected from the token when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            username: None,
        }
    }
}

/// Read cache and overlay tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencySettings {
    /// Lifetime of a cached followers/following listing
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Inactivity after which recent-mutation overlay state is dropped
    #[serde(default = "default_quiescence_secs")]
    pub quiescence_secs: u64,

    /// Live checks made when the overlay and the API disagree
    #[serde(default = "default_max_consistency_attempts")]
    pub max_consistency_attempts: u32,
}

fn default_cache_ttl_secs() -> u64 {
    5
}

fn default_quiescence_secs() -> u64 {
    60
}

fn default_max_consistency_attempts() -> u32 {
    3
}

impl Default for ConsistencySettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            quiescence_secs: default_quiescence_secs(),
            max_consistency_attempts: default_max_consistency_attempts(),
        }
    }
}

impl ConsistencySettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn quiescence_window(&self) -> Duration {
        Duration::from_secs(self.quiescence_secs)
    }
}

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Mutations in flight per chunk
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout applied to every API request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Items requested per listing page (GitHub caps this at 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_batch_size() -> usize {
    crate::batch::DEFAULT_BATCH_SIZE
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> u32 {
    100
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl BatchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// followgraph configuration
///
/// Represents the complete ~/.config/followgraph/config.yaml file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowGraphConfig {
    #[serde(default)]
    pub github: GitHubSettings,

    #[serde(default)]
    pub consistency: ConsistencySettings,

    #[serde(default)]
    pub batch: BatchSettings,
}

impl FollowGraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::FollowGraphError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading followgraph configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            batch_size = config.batch.batch_size,
            cache_ttl_secs = config.consistency.cache_ttl_secs,
            quiescence_secs = config.consistency.quiescence_secs,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Load from `path`, or from the default path, falling back to defaults
    /// when the file does not exist
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving followgraph configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/followgraph/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("followgraph");
        path.push("config.yaml");
        path
    }

    /// Apply `GITHUB_API_BASE_URL`, `GITHUB_USERNAME` and `REQUEST_TIMEOUT`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GITHUB_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.github.api_url = url.trim().to_string();
        }
        if let Some(name) = lookup("GITHUB_USERNAME").filter(|v| !v.trim().is_empty()) {
            self.github.username = Some(name.trim().to_string());
        }
        if let Some(raw) = lookup("REQUEST_TIMEOUT") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.batch.request_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid REQUEST_TIMEOUT"),
            }
        }
    }

    /// Resolve the API token from the environment
    pub fn resolve_token(&self) -> Result<String> {
        self.resolve_token_with(|key| std::env::var(key).ok())
    }

    fn resolve_token_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        std::iter::once(self.github.token_env.as_str())
            .chain(FALLBACK_TOKEN_ENVS)
            .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
            .map(|v| v.trim().to_string())
            .ok_or_else(|| {
                crate::FollowGraphError::Config(format!(
                    "{} or GITHUB_PERSONAL_ACCESS_TOKEN environment variable is required",
                    self.github.token_env
                ))
            })
    }
}
