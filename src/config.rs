//! Configuration management for tasksync
//!
//! This module handles loading, parsing, and validation of configuration files.

use crate::auth::OAuthConfig;
use crate::constants::{
    CONFIG_GENERATED, DEFAULT_ITEM_TIMEOUT_SECS, DEFAULT_LIST_NAME, DEFAULT_MAX_CONCURRENT_PASSES,
    DEFAULT_REFRESH_SKEW_MINUTES, DEFAULT_REQUEST_TIMEOUT_SECS, GRAPH_API_BASE, MICROSOFT_TOKEN_URL, MSTODO_SCOPES,
};
use crate::sync::SyncOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Provider connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the Graph API
    pub api_base_url: String,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// Environment variable holding the OAuth client id
    pub client_id_env: String,
    /// Environment variable holding the OAuth client secret (public clients leave it unset)
    pub client_secret_env: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Timeout of a single HTTP request in seconds
    pub request_timeout_secs: u64,
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Auto-sync interval in minutes (0 = disabled, manual sync only)
    pub auto_sync_interval_minutes: u64,
    /// Upper bound on the time spent on one task, in seconds
    pub item_timeout_secs: u64,
    /// Refresh access tokens this many minutes before they expire
    pub refresh_skew_minutes: i64,
    /// Collection receiving tasks that belong to no project
    pub default_list_name: String,
    /// Export local tasks that were never bound to the provider
    pub export_unbound_tasks: bool,
    /// Maximum number of users synced at the same time
    pub max_concurrent_passes: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Database URL; empty means `<data dir>/tasksync/tasksync.db`
    pub database_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Minimum level: error, warn, info, debug or trace
    pub level: String,
    /// Also write logs to `<data dir>/tasksync/tasksync.log`
    pub file: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: GRAPH_API_BASE.to_string(),
            token_url: MICROSOFT_TOKEN_URL.to_string(),
            client_id_env: "TASKSYNC_CLIENT_ID".to_string(),
            client_secret_env: "TASKSYNC_CLIENT_SECRET".to_string(),
            redirect_uri: "http://localhost:8400/callback".to_string(),
            scopes: MSTODO_SCOPES.iter().map(|s| s.to_string()).collect(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_interval_minutes: 15,
            item_timeout_secs: DEFAULT_ITEM_TIMEOUT_SECS,
            refresh_skew_minutes: DEFAULT_REFRESH_SKEW_MINUTES,
            default_list_name: DEFAULT_LIST_NAME.to_string(),
            export_unbound_tasks: false,
            max_concurrent_passes: DEFAULT_MAX_CONCURRENT_PASSES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            file: false,
        }
    }
}

impl SyncConfig {
    pub fn refresh_skew(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.refresh_skew_minutes)
    }

    pub fn auto_sync_interval(&self) -> Option<Duration> {
        (self.auto_sync_interval_minutes > 0).then(|| Duration::from_secs(self.auto_sync_interval_minutes * 60))
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        SyncOptions {
            item_timeout: Duration::from_secs(config.item_timeout_secs),
            default_list_name: config.default_list_name.clone(),
            export_unbound_tasks: config.export_unbound_tasks,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// OAuth settings with the client credentials read from the environment.
    pub fn oauth_config(&self) -> Result<OAuthConfig> {
        let client_id = std::env::var(&self.client_id_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("OAuth client id not set; export {}", self.client_id_env))?;
        let client_secret = std::env::var(&self.client_secret_env)
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(OAuthConfig {
            client_id,
            client_secret,
            token_url: self.token_url.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: self.scopes.clone(),
            timeout: self.request_timeout(),
        })
    }
}

impl StorageConfig {
    /// Configured database URL, or a SQLite file in the data directory.
    pub fn resolved_database_url(&self) -> Result<String> {
        if !self.database_url.is_empty() {
            return Ok(self.database_url.clone());
        }

        let dir = Config::get_data_dir()?;
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        Ok(format!("sqlite://{}?mode=rwc", dir.join("tasksync.db").display()))
    }
}

impl Config {
    /// Load configuration from file or return defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file()?;

        if let Some(path) = config_path {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in order of precedence
    fn find_config_file() -> Result<Option<PathBuf>> {
        // 1. Check current directory
        let current_dir_config = PathBuf::from("tasksync.toml");
        if current_dir_config.exists() {
            return Ok(Some(current_dir_config));
        }

        // 2. Check XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("tasksync").join("config.toml");
            if xdg_config.exists() {
                return Ok(Some(xdg_config));
            }
        }

        Ok(None)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("api_base_url", &self.provider.api_base_url),
            ("token_url", &self.provider.token_url),
        ] {
            url::Url::parse(value).with_context(|| format!("Invalid {name} '{value}'"))?;
        }
        if self.provider.client_id_env.trim().is_empty() {
            anyhow::bail!("client_id_env cannot be empty");
        }
        if self.provider.scopes.is_empty() {
            anyhow::bail!("scopes cannot be empty");
        }
        if self.provider.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        // Validate sync settings
        if self.sync.auto_sync_interval_minutes > 1440 {
            anyhow::bail!("auto_sync_interval_minutes cannot exceed 1440 (24 hours)");
        }
        if self.sync.item_timeout_secs == 0 {
            anyhow::bail!("item_timeout_secs must be greater than 0");
        }
        if !(0..=60).contains(&self.sync.refresh_skew_minutes) {
            anyhow::bail!(
                "refresh_skew_minutes must be between 0 and 60, got {}",
                self.sync.refresh_skew_minutes
            );
        }
        if self.sync.default_list_name.trim().is_empty() {
            anyhow::bail!("default_list_name cannot be empty");
        }
        if self.sync.max_concurrent_passes == 0 {
            anyhow::bail!("max_concurrent_passes must be at least 1");
        }

        // Validate logging
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            anyhow::bail!("Invalid logging level '{}'", self.logging.level);
        }

        Ok(())
    }

    /// Generate default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Self::default();
        let toml_content = toml::to_string_pretty(&config).context("Failed to serialize default config")?;

        // Add header comment
        let header = format!(
            "# tasksync Configuration File\n# Generated on {}\n\n",
            chrono::Local::now().format("%Y-%m-%d")
        );

        let full_content = header + &toml_content;

        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(&path, full_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        println!("{}: {}", CONFIG_GENERATED, path.as_ref().display());
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn get_xdg_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
            .map(|dir| dir.join("tasksync"))
    }

    /// Get the default config file path
    pub fn get_default_config_path() -> Result<PathBuf> {
        Ok(Self::get_xdg_config_dir()?.join("config.toml"))
    }

    /// Get the data directory holding the database and log file
    pub fn get_data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
            .map(|dir| dir.join("tasksync"))
    }
}
