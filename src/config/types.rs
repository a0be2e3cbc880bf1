//! Configuration type definitions
//!
//! Defines all configuration structures for the Cloud Metrics Library.

use serde::{Deserialize, Serialize};

use crate::error::MetricsConfigError;

/// Shape of the delay curve between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Same delay before every retry
    Fixed,
    /// Delay grows by one unit per attempt
    Linear,
}

impl Default for BackoffKind {
    fn default() -> Self {
        Self::Linear
    }
}

/// Retry settings applied to every provider call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 5)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay unit in milliseconds (default: 1000)
    #[serde(default = "default_delay_millis")]
    pub delay_millis: u64,

    /// Delay curve (default: linear)
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Upper bound for a single delay in milliseconds (default: 30000)
    #[serde(default = "default_max_delay_millis")]
    pub max_delay_millis: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_millis: default_delay_millis(),
            backoff: BackoffKind::default(),
            max_delay_millis: default_max_delay_millis(),
        }
    }
}

impl RetryConfig {
    /// Validate retry settings
    pub fn validate(&self) -> Result<(), MetricsConfigError> {
        if self.max_retries > 20 {
            return Err(MetricsConfigError::InvalidRetry(
                "max_retries must be at most 20".to_string(),
            ));
        }

        if self.max_delay_millis < self.delay_millis {
            return Err(MetricsConfigError::InvalidRetry(format!(
                "max_delay_millis ({}) must not be lower than delay_millis ({})",
                self.max_delay_millis, self.delay_millis
            )));
        }

        if self.max_delay_millis > 300_000 {
            return Err(MetricsConfigError::InvalidRetry(
                "max_delay_millis must be at most 300000 (5 minutes)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default query windows
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Window length when a request gives no start (default: 3600)
    #[serde(default = "default_window_secs")]
    pub default_window_secs: u64,

    /// Window length used for last-known-value requests (default: 300)
    #[serde(default = "default_last_known_window_secs")]
    pub last_known_window_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            default_window_secs: default_window_secs(),
            last_known_window_secs: default_last_known_window_secs(),
        }
    }
}

/// Longest window a request may look back over
pub const MAX_WINDOW_SECS: u64 = 31 * 86_400;

impl WindowConfig {
    /// Validate window settings
    pub fn validate(&self) -> Result<(), MetricsConfigError> {
        if self.default_window_secs == 0 {
            return Err(MetricsConfigError::InvalidWindow(
                "default_window_secs must be greater than 0".to_string(),
            ));
        }

        if self.last_known_window_secs == 0 {
            return Err(MetricsConfigError::InvalidWindow(
                "last_known_window_secs must be greater than 0".to_string(),
            ));
        }

        // Providers keep raw data for at most a few weeks
        if self.default_window_secs > MAX_WINDOW_SECS {
            return Err(MetricsConfigError::InvalidWindow(
                "default_window_secs must be at most 31 days".to_string(),
            ));
        }

        if self.last_known_window_secs > MAX_WINDOW_SECS {
            return Err(MetricsConfigError::InvalidWindow(
                "last_known_window_secs must be at most 31 days".to_string(),
            ));
        }

        Ok(())
    }
}

/// Settings for the HTTP monitoring backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpBackendConfig {
    /// Base URL template; `{region}` is replaced with the resource region
    #[serde(default = "default_endpoint_template")]
    pub endpoint_template: String,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            endpoint_template: default_endpoint_template(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HttpBackendConfig {
    /// Validate HTTP backend settings
    pub fn validate(&self) -> Result<(), MetricsConfigError> {
        if self.endpoint_template.is_empty() {
            return Err(MetricsConfigError::MissingRequiredField(
                "endpoint_template".to_string(),
            ));
        }

        let sample = self.endpoint_for_region("region-1");
        let parsed = url::Url::parse(&sample)
            .map_err(|e| MetricsConfigError::InvalidUrl(format!("{}: {}", sample, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(MetricsConfigError::InvalidUrl(
                "endpoint_template must use http:// or https:// scheme".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(MetricsConfigError::ValidationFailed(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL for `region`
    pub fn endpoint_for_region(&self, region: &str) -> String {
        self.endpoint_template.replace("{region}", region)
    }
}

/// Main configuration structure for the Cloud Metrics Library
///
/// # Configuration Sources
///
/// Configuration can be loaded from:
/// - YAML files
/// - Environment variables (with `METRICS_*` prefix)
/// - Programmatic API (using `ConfigBuilder`)
///
/// # Default Values
///
/// - `retry`: 5 retries, linear backoff with a 1000 ms unit, capped at 30 s
/// - `window`: 1 hour default window, 5 minute last-known window
/// - `http`: Huawei Cloud CES endpoint template, 30 second timeout
///
/// # Example
///
/// ```no_run
/// use cloud_metrics_library::ConfigBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConfigBuilder::new()
///     .max_retries(3)
///     .retry_delay_millis(200)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Query window defaults
    #[serde(default)]
    pub window: WindowConfig,

    /// HTTP backend settings
    #[serde(default)]
    pub http: HttpBackendConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), MetricsConfigError> {
        self.retry.validate()?;
        self.window.validate()?;
        self.http.validate()?;
        Ok(())
    }
}

/// Builder for creating configurations programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set retries after the first attempt
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    /// Set the retry delay unit in milliseconds
    pub fn retry_delay_millis(mut self, millis: u64) -> Self {
        self.config.retry.delay_millis = millis;
        self
    }

    /// Set the delay curve
    pub fn backoff(mut self, backoff: BackoffKind) -> Self {
        self.config.retry.backoff = backoff;
        self
    }

    /// Set the upper bound for a single delay in milliseconds
    pub fn max_retry_delay_millis(mut self, millis: u64) -> Self {
        self.config.retry.max_delay_millis = millis;
        self
    }

    /// Set the default window length in seconds
    pub fn default_window_secs(mut self, secs: u64) -> Self {
        self.config.window.default_window_secs = secs;
        self
    }

    /// Set the last-known window length in seconds
    pub fn last_known_window_secs(mut self, secs: u64) -> Self {
        self.config.window.last_known_window_secs = secs;
        self
    }

    /// Set the HTTP endpoint template
    pub fn endpoint_template(mut self, template: impl Into<String>) -> Self {
        self.config.http.endpoint_template = template.into();
        self
    }

    /// Set the HTTP request timeout in seconds
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http.request_timeout_secs = secs;
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<Config, MetricsConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// Default value functions
fn default_max_retries() -> u32 {
    5
}

fn default_delay_millis() -> u64 {
    1000
}

fn default_max_delay_millis() -> u64 {
    30_000
}

fn default_window_secs() -> u64 {
    3600
}

fn default_last_known_window_secs() -> u64 {
    300
}

fn default_endpoint_template() -> String {
    "https://ces.{region}.myhuaweicloud.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
