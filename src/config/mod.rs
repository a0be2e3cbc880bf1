//! Configuration module
//!
//! Provides configuration management for the Cloud Metrics Library including
//! loading from YAML files, environment variables, and programmatic API.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{BackoffKind, Config, ConfigBuilder, HttpBackendConfig, RetryConfig, WindowConfig};
