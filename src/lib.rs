//! Cloud Metrics Library
//!
//! Retrieves performance metrics of deployed cloud resources from the
//! provider's monitoring service and returns them in a uniform shape.
//!
//! # Features
//!
//! - Per-resource and per-service (batch) metric retrieval
//! - Metric discovery against the provider's catalog
//! - Bounded retry on rate limiting and server errors
//! - Last-known-value cache fallback
//! - Pluggable provider backends and credential resolvers
//! - Configurable via YAML, environment variables, or programmatic API
//! - Mock backend for testing
//!
//! # Example
//!
//! ```no_run
//! use cloud_metrics_library::{Config, MetricsEngine, StaticCredentialResolver};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), cloud_metrics_library::MetricsError> {
//! let engine = MetricsEngine::new(Config::default(), Arc::new(StaticCredentialResolver::new()))?;
//!
//! // Register one backend per provider
//! // engine.register_backend(backend).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod mock;
pub mod monitor;
pub mod provider;

// Re-export public API
pub use api::public::MetricsEngine;
pub use config::{
    BackoffKind, Config, ConfigBuilder, ConfigLoader, HttpBackendConfig, RetryConfig,
    WindowConfig,
};
pub use error::{MetricsConfigError, MetricsError, ProviderError};
pub use mock::service::{MockOperation, MockProviderBackend};
pub use monitor::{
    CacheKey, DataPoint, InMemoryMetricStore, MetricKind, MetricQuery, MetricResult, MetricStore,
    MonitoredResource, Provider, ResourceKind, ServiceMetricQuery,
};
pub use provider::{
    Credential, CredentialResolver, CredentialType, EnvCredentialResolver, HttpMonitorBackend,
    ProviderClient, ProviderMetricsBackend, StaticCredentialResolver,
};

// Initialize tracing subscriber for structured logging
use tracing_subscriber::EnvFilter;

/// Initialize structured logging
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

/// Initialize JSON logging for log shippers
pub fn init_json_logging() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_current_span(true)
        .try_init();
}
