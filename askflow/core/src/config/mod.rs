//! TOML Configuration File Support
//!
//! Centralized configuration loading for askflow, supporting a TOML file at
//! `~/.config/askflow/askflow.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables (`ASKFLOW_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/askflow/askflow.toml` (typically `~/.config/askflow/askflow.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "https://ask.example.com"
//! environment = "QA"
//! environment_header = "X-OpsFlo-Env"
//! request_timeout_secs = 120
//!
//! [enrichment]
//! max_attempts = 20
//! interval_ms = 1000
//! progress_interval_ms = 900
//!
//! [chat]
//! visualize_by_default = false
//! max_query_length = 4000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::DEFAULT_ENVIRONMENT_HEADER;
use crate::enrichment::EnrichmentConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base URL of the query service
    pub base_url: Option<String>,

    /// Value sent in the environment-selector header
    pub environment: Option<String>,

    /// Name of the environment-selector header
    pub environment_header: Option<String>,

    /// Ask request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Enrichment section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentToml {
    /// Maximum insights status checks per job
    pub max_attempts: Option<u32>,

    /// Delay between status checks in milliseconds
    pub interval_ms: Option<u64>,

    /// Progress phase rotation period in milliseconds
    pub progress_interval_ms: Option<u64>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Start with the visualization toggle on
    pub visualize_by_default: Option<bool>,

    /// Maximum query length in characters
    pub max_query_length: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AskflowToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Enrichment configuration section
    pub enrichment: EnrichmentToml,

    /// Chat configuration section
    pub chat: ChatToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Default query service URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default ask request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default maximum query length in characters
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 4000;

/// Centralized configuration for askflow
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct AskflowConfig {
    /// Base URL of the query service
    pub base_url: String,

    /// Value for the environment-selector header (header omitted when `None`)
    pub environment: Option<String>,

    /// Name of the environment-selector header
    pub environment_header: String,

    /// Ask request timeout
    pub request_timeout: Duration,

    /// Insights polling settings
    pub enrichment: EnrichmentConfig,

    /// Start with the visualization toggle on
    pub visualize_by_default: bool,

    /// Maximum query length in characters
    pub max_query_length: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for AskflowConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            environment: None,
            environment_header: DEFAULT_ENVIRONMENT_HEADER.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enrichment: EnrichmentConfig::default(),
            visualize_by_default: false,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl AskflowConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check that values are usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.environment_header.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "environment_header must not be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.enrichment.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "enrichment max_attempts must be at least 1".to_string(),
            ));
        }
        if self.enrichment.interval.is_zero() || self.enrichment.progress_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "enrichment intervals must be greater than zero".to_string(),
            ));
        }
        if self.max_query_length == 0 {
            return Err(ConfigError::ValidationError(
                "max_query_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/askflow/askflow.toml` or
/// `~/.config/askflow/askflow.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("askflow").join("askflow.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed. A missing
/// config file is not an error. Values are not validated here; call
/// [`AskflowConfig::validate`] once command-line overrides are applied.
pub fn load_config() -> Result<AskflowConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<AskflowConfig, ConfigError> {
    let mut config = AskflowConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: AskflowToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut AskflowConfig, toml: &AskflowToml) {
    // Backend settings
    if let Some(ref url) = toml.backend.base_url {
        config.base_url = url.clone();
    }
    if toml.backend.environment.is_some() {
        config.environment = toml.backend.environment.clone();
    }
    if let Some(ref header) = toml.backend.environment_header {
        config.environment_header = header.clone();
    }
    if let Some(secs) = toml.backend.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }

    // Enrichment settings
    if let Some(attempts) = toml.enrichment.max_attempts {
        config.enrichment.max_attempts = attempts;
    }
    if let Some(ms) = toml.enrichment.interval_ms {
        config.enrichment.interval = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.enrichment.progress_interval_ms {
        config.enrichment.progress_interval = Duration::from_millis(ms);
    }

    // Chat settings
    if let Some(visualize) = toml.chat.visualize_by_default {
        config.visualize_by_default = visualize;
    }
    if let Some(length) = toml.chat.max_query_length {
        config.max_query_length = length;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut AskflowConfig) {
    apply_env_lookup(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an environment lookup function
///
/// Unparseable numeric values are ignored.
fn apply_env_lookup(config: &mut AskflowConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("ASKFLOW_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(env) = lookup("ASKFLOW_ENV") {
        config.environment = Some(env);
        config.source = ConfigSource::Env;
    }
    if let Some(header) = lookup("ASKFLOW_ENV_HEADER") {
        config.environment_header = header;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup("ASKFLOW_REQUEST_TIMEOUT") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.request_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(attempts) = lookup("ASKFLOW_ENRICHMENT_MAX_ATTEMPTS") {
        if let Ok(n) = attempts.parse::<u32>() {
            config.enrichment.max_attempts = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(interval) = lookup("ASKFLOW_ENRICHMENT_INTERVAL_MS") {
        if let Ok(ms) = interval.parse::<u64>() {
            config.enrichment.interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(visualize) = lookup("ASKFLOW_VISUALIZE") {
        config.visualize_by_default = visualize != "0" && visualize.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(length) = lookup("ASKFLOW_MAX_QUERY_LENGTH") {
        if let Ok(n) = length.parse::<usize>() {
            config.max_query_length = n;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Environment value override
    pub environment: Option<String>,

    /// Environment header name override
    pub environment_header: Option<String>,

    /// Visualization toggle override
    pub visualize: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set environment value override
    #[must_use]
    pub fn with_environment(mut self, environment: String) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Set environment header name override
    #[must_use]
    pub fn with_environment_header(mut self, header: String) -> Self {
        self.environment_header = Some(header);
        self
    }

    /// Set visualization toggle override
    #[must_use]
    pub fn with_visualize(mut self, visualize: bool) -> Self {
        self.visualize = Some(visualize);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut AskflowConfig) {
        if self.base_url.is_some()
            || self.environment.is_some()
            || self.environment_header.is_some()
            || self.visualize.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
        }
        if let Some(ref environment) = self.environment {
            config.environment = Some(environment.clone());
        }
        if let Some(ref header) = self.environment_header {
            config.environment_header = header.clone();
        }
        if let Some(visualize) = self.visualize {
            config.visualize_by_default = visualize;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
