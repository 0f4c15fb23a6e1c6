use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{Credentials, Endpoint};
use crate::error::MirrorError;

/// Main configuration structure for ghmirror
///
/// Built once at startup from the optional YAML file and the command line, then
/// passed by reference to every component that needs it.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory the mirror is written to
    #[serde(default = "default_backup_path")]
    pub backup_path: String,

    /// Account used for API basic auth and embedded in clone URLs
    #[serde(default)]
    pub username: Option<String>,

    /// Password or personal access token
    #[serde(default)]
    pub secret: Option<String>,

    /// API root, without trailing slash
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Account namespace: "/user", "/users/<name>" or "/orgs/<name>"
    #[serde(default = "default_account_path")]
    pub account_path: String,

    /// Repositories requested per listing page
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Listing pages to walk; 1 keeps the single-request behavior
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Upper bound for each HTTP request and git process, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

/// Values supplied on the command line; `Some` wins over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub backup_path: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub account_path: Option<String>,
    pub api_base: Option<String>,
}

// Default value functions
fn default_backup_path() -> String {
    "~/github/".to_string()
}
fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_account_path() -> String {
    "/user".to_string()
}
fn default_per_page() -> u32 {
    100
}
fn default_max_pages() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_path: default_backup_path(),
            username: None,
            secret: None,
            api_base: default_api_base(),
            account_path: default_account_path(),
            per_page: default_per_page(),
            max_pages: default_max_pages(),
            timeout_secs: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location if a file exists there, else defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("ghmirror").join("config.yml"))
    }

    /// Apply command line values on top of the file values
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(path) = overrides.backup_path {
            self.backup_path = path;
        }
        if let Some(username) = overrides.username {
            self.username = Some(username);
        }
        if let Some(secret) = overrides.secret {
            self.secret = Some(secret);
        }
        if let Some(account_path) = overrides.account_path {
            self.account_path = account_path;
        }
        if let Some(api_base) = overrides.api_base {
            self.api_base = api_base;
        }
        self
    }

    /// Expand `~` and environment variables in the backup path
    pub fn expand_paths(&mut self) -> Result<()> {
        self.backup_path = shellexpand::full(&self.backup_path)
            .context("Failed to expand backup_path")?
            .into_owned();

        Ok(())
    }

    /// Check that every required setting is present and non-empty
    pub fn validate(&self) -> Result<(), MirrorError> {
        let mut missing = Vec::new();

        if self.backup_path.is_empty() {
            missing.push("backup_path");
        }
        if self.username.as_deref().map_or(true, str::is_empty) {
            missing.push("username");
        }
        if self.secret.as_deref().map_or(true, str::is_empty) {
            missing.push("secret");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MirrorError::Configuration { missing })
        }
    }

    pub fn backup_root(&self) -> PathBuf {
        PathBuf::from(&self.backup_path)
    }

    /// Credentials for API calls and clone URLs
    pub fn credentials(&self) -> Result<Credentials, MirrorError> {
        self.validate()?;
        Ok(Credentials::new(
            self.username.clone().unwrap_or_default(),
            self.secret.clone().unwrap_or_default(),
        ))
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.api_base, &self.account_path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
