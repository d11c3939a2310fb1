//! Configuration model and loader
//!
//! Configuration is assembled from an optional TOML file followed by
//! `KEYSTONE_*` environment overrides, for example
//! `KEYSTONE_CACHE__MAX_ENTRIES=500`. Missing sections fall back to their
//! defaults.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Default registration cap per container
pub const DEFAULT_MAX_REGISTRATIONS: usize = 10_000;

/// Default limit on how deeply scopes may nest below the root
pub const DEFAULT_MAX_SCOPE_DEPTH: usize = 10;

/// Default cache TTL (five minutes)
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct KeystoneConfig {
    /// Dependency-injection container settings
    pub container: ContainerConfig,
    /// Cache service settings
    pub cache: CacheConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Container settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContainerConfig {
    /// Maximum number of registrations a single container accepts
    pub max_registrations: usize,
    /// Maximum nesting depth of child scopes; the root is depth 0
    pub max_scope_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_registrations: DEFAULT_MAX_REGISTRATIONS,
            max_scope_depth: DEFAULT_MAX_SCOPE_DEPTH,
        }
    }
}

/// Cache service settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every cache operation degrades to a miss or no-op
    pub enabled: bool,
    /// TTL applied when a `set` does not name one; 0 means never expire
    pub default_ttl_ms: u64,
    /// Upper bound on live entries; `None` is unbounded
    pub max_entries: Option<usize>,
    /// Namespace prefix for keys built by the cache service
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_ms: DEFAULT_CACHE_TTL_MS,
            max_entries: None,
            namespace: "global".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`,
    /// `keystone_di=debug`)
    pub level: String,
    /// Include event targets in output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl KeystoneConfig {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.container.max_registrations == 0 {
            return Err(ConfigError::Validation(
                "container.max_registrations must be greater than 0".to_string(),
            ));
        }
        if self.cache.namespace.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cache.namespace must not be empty".to_string(),
            ));
        }
        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::Validation(
                "cache.max_entries must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: KeystoneConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Configuration loader
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a manager reading the default config path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: "KEYSTONE".to_string(),
        }
    }

    /// Create with custom config path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: "KEYSTONE".to_string(),
        }
    }

    /// Override the environment variable prefix
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Path the manager reads from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keystone")
            .join("config.toml")
    }

    /// Load, merge and validate configuration
    pub fn load(&self) -> Result<KeystoneConfig> {
        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let keystone_config: KeystoneConfig = config.try_deserialize()?;
        keystone_config.validate()?;

        debug!(
            path = %self.config_path.display(),
            prefix = %self.env_prefix,
            "Loaded keystone configuration"
        );
        Ok(keystone_config)
    }

    /// Write configuration to the manager's path as TOML
    pub fn save(&self, config: &KeystoneConfig) -> Result<()> {
        let toml = config.to_toml_string()?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
