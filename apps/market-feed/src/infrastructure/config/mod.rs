//! Configuration loading, validation, and environment variable interpolation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use market_feed::infrastructure::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//!
//! println!("exchange: {}", config.resolver.exchange);
//! ```

mod resolver;
mod snapshot;
mod validator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use resolver::ResolverSettings;
pub use snapshot::SnapshotSettings;
pub use validator::ValidatorSettings;

/// Longest rollover window accepted, in days.
const MAX_ROLLOVER_DAYS: u32 = 31;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Contract resolver settings.
    #[serde(default)]
    pub resolver: ResolverSettings,
    /// Snapshot client settings.
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    /// Validator settings.
    #[serde(default)]
    pub validator: ValidatorSettings,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log output settings, read by [`crate::infrastructure::telemetry::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `market_feed=debug`.
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
    /// Attach the current span to JSON lines.
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            include_spans: true,
        }
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    // An empty or comment-only document means "all defaults".
    let config: Config = if interpolated.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    }) {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. A missing variable
/// without a default becomes the empty string.
#[allow(clippy::expect_used)] // Regex is compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.resolver.exchange.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "resolver.exchange must not be empty".to_string(),
        ));
    }

    if config.resolver.cache_ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.cache_ttl_secs must be positive".to_string(),
        ));
    }

    if config.resolver.rollover_days > MAX_ROLLOVER_DAYS {
        return Err(ConfigError::ValidationError(format!(
            "resolver.rollover_days must be at most {MAX_ROLLOVER_DAYS}"
        )));
    }

    if config.snapshot.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "snapshot.poll_interval_ms must be positive".to_string(),
        ));
    }

    if config.snapshot.poll_interval_ms > config.snapshot.max_wait_ms {
        return Err(ConfigError::ValidationError(
            "snapshot.poll_interval_ms must not exceed snapshot.max_wait_ms".to_string(),
        ));
    }

    if config.validator.vix_min > config.validator.vix_max {
        return Err(ConfigError::ValidationError(
            "validator.vix_min must not exceed validator.vix_max".to_string(),
        ));
    }

    if config.validator.nbcv_total_tolerance_pct < 0.0
        || config.validator.nbcv_delta_tolerance_pct < 0.0
    {
        return Err(ConfigError::ValidationError(
            "validator.nbcv tolerances must not be negative".to_string(),
        ));
    }

    let valid_formats = ["json", "pretty"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "logging.format must be one of: {valid_formats:?}"
        )));
    }

    Ok(())
}
