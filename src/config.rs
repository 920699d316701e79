use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// The only file store backend this build can serve.
pub const FILESYSTEM_STORE_TYPE: &str = "FileSystem";

/// Smallest session token entropy, in random bytes.
pub const MIN_SESSION_KEY_BYTES: usize = 16;

/// Argon2 refuses salts shorter than this.
pub const MIN_SALT_LENGTH: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported file store type '{0}' (expected '{FILESYSTEM_STORE_TYPE}')")]
    UnsupportedStoreType(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// File store designator. Must be `FileSystem`.
    #[serde(rename = "type")]
    pub store_type: String,

    /// Root directory of the file store.
    pub root: String,

    pub host: String,

    pub port: u16,

    pub database_path: String,

    pub log_level: String,

    /// Whether to set the Secure flag on the session cookie.
    /// Leave off for local development without HTTPS.
    pub secure_cookies: bool,

    pub session: SessionConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime from creation (default: 72 hours)
    pub lifetime_hours: u32,

    /// Random bytes per session token before base64 encoding
    pub key_bytes: usize,

    /// Expired-session sweep period; 0 disables the interval sweeper
    pub sweep_interval_minutes: u32,

    /// Six-field cron expression; takes precedence over the interval
    pub sweep_cron: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_hours: 72,
            key_bytes: 16,
            sweep_interval_minutes: 60,
            sweep_cron: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2id iterations
    pub argon2_time_cost: u32,

    /// Argon2id lanes
    pub argon2_parallelism: u32,

    pub salt_length: usize,

    pub key_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 64 * 1024,
            argon2_time_cost: 3,
            argon2_parallelism: 2,
            salt_length: 16,
            key_length: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_type: FILESYSTEM_STORE_TYPE.to_string(),
            root: "./data/files".to_string(),
            host: "localhost".to_string(),
            port: 8000,
            database_path: "sqlite:data/obsync.db".to_string(),
            log_level: "info".to_string(),
            secure_cookies: false,
            session: SessionConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads from `explicit` if given, otherwise from the first config file
    /// found in the search path, otherwise defaults. The result is validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from: {}", path.display());
            return Self::load_from_path(path);
        }

        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.yaml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("obsync").join("config.yaml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_type != FILESYSTEM_STORE_TYPE {
            return Err(ConfigError::UnsupportedStoreType(self.store_type.clone()));
        }

        if self.root.trim().is_empty() {
            return Err(ConfigError::Invalid("root cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be > 0".to_string()));
        }

        if self.session.lifetime_hours == 0 {
            return Err(ConfigError::Invalid(
                "session.lifetime_hours must be > 0".to_string(),
            ));
        }

        if self.session.key_bytes < MIN_SESSION_KEY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "session.key_bytes must be at least {MIN_SESSION_KEY_BYTES}"
            )));
        }

        if self.security.salt_length < MIN_SALT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "security.salt_length must be at least {MIN_SALT_LENGTH}"
            )));
        }

        argon2::Params::new(
            self.security.argon2_memory_cost_kib,
            self.security.argon2_time_cost,
            self.security.argon2_parallelism,
            Some(self.security.key_length),
        )
        .map_err(|e| ConfigError::Invalid(format!("security: {e}")))?;

        Ok(())
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.session.lifetime_hours))
    }
}
