//! Configuration loader
//!
//! Loads configuration from YAML files, environment variables, or programmatic API.
//! Priority: environment variables > provided config > defaults

use std::env;
use std::str::FromStr;

use crate::config::types::{BackoffKind, Config};
use crate::error::MetricsConfigError;
use tracing::{debug, info, warn};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from YAML file
    pub fn from_yaml(path: impl AsRef<std::path::Path>) -> Result<Config, MetricsConfigError> {
        let path = path.as_ref();
        info!(
            config_path = %path.display(),
            "Loading configuration from YAML file"
        );

        let content = std::fs::read_to_string(path).map_err(|e| {
            warn!(
                config_path = %path.display(),
                error = %e,
                "Failed to read configuration file"
            );
            MetricsConfigError::Io(format!("Failed to read config file: {}", e))
        })?;

        let mut config: Config = serde_yaml::from_str(&content).map_err(|e| {
            warn!(
                config_path = %path.display(),
                error = %e,
                "Failed to parse YAML configuration"
            );
            MetricsConfigError::ValidationFailed(format!("Failed to parse YAML: {}", e))
        })?;

        Self::apply_env_overrides(&mut config);

        config.validate().map_err(|e| {
            warn!(
                config_path = %path.display(),
                error = %e,
                "Configuration validation failed"
            );
            e
        })?;

        info!(
            config_path = %path.display(),
            max_retries = config.retry.max_retries,
            retry_delay_millis = config.retry.delay_millis,
            endpoint_template = %config.http.endpoint_template,
            "Configuration loaded and validated successfully"
        );

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Config, MetricsConfigError> {
        info!("Loading configuration from environment variables");
        Self::load(None)
    }

    /// Load configuration with priority: environment variables > provided config > defaults
    pub fn load(provided: Option<Config>) -> Result<Config, MetricsConfigError> {
        let mut config = provided.unwrap_or_default();

        Self::apply_env_overrides(&mut config);

        config.validate().map_err(|e| {
            warn!(error = %e, "Configuration validation failed");
            e
        })?;

        info!(
            max_retries = config.retry.max_retries,
            retry_delay_millis = config.retry.delay_millis,
            default_window_secs = config.window.default_window_secs,
            "Configuration loaded and validated successfully"
        );

        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(config: &mut Config) {
        if let Some(retries) = parse_env::<u32>("METRICS_MAX_RETRIES") {
            config.retry.max_retries = retries;
        }

        if let Some(millis) = parse_env::<u64>("METRICS_RETRY_DELAY_MILLIS") {
            config.retry.delay_millis = millis;
        }

        if let Some(millis) = parse_env::<u64>("METRICS_MAX_RETRY_DELAY_MILLIS") {
            config.retry.max_delay_millis = millis;
        }

        if let Ok(backoff) = env::var("METRICS_RETRY_BACKOFF") {
            match backoff.to_lowercase().as_str() {
                "fixed" => config.retry.backoff = BackoffKind::Fixed,
                "linear" => config.retry.backoff = BackoffKind::Linear,
                other => {
                    warn!(
                        env_var = "METRICS_RETRY_BACKOFF",
                        value = %other,
                        "Unknown backoff kind, keeping configured value"
                    );
                }
            }
        }

        if let Some(secs) = parse_env::<u64>("METRICS_DEFAULT_WINDOW_SECS") {
            config.window.default_window_secs = secs;
        }

        if let Some(secs) = parse_env::<u64>("METRICS_LAST_KNOWN_WINDOW_SECS") {
            config.window.last_known_window_secs = secs;
        }

        if let Ok(template) = env::var("METRICS_HTTP_ENDPOINT_TEMPLATE") {
            debug!(
                env_var = "METRICS_HTTP_ENDPOINT_TEMPLATE",
                value = %template,
                "Applying environment variable override"
            );
            config.http.endpoint_template = template;
        }

        if let Some(secs) = parse_env::<u64>("METRICS_HTTP_REQUEST_TIMEOUT_SECS") {
            config.http.request_timeout_secs = secs;
        }
    }
}

/// Read and parse an environment variable, ignoring values that do not parse
fn parse_env<T>(name: &str) -> Option<T>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => {
            debug!(
                env_var = name,
                value = %value,
                "Applying environment variable override"
            );
            Some(value)
        }
        Err(e) => {
            warn!(
                env_var = name,
                value = %raw,
                error = %e,
                "Failed to parse environment variable, using default"
            );
            None
        }
    }
}
