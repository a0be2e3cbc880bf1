//! Public API for embedded library usage
//!
//! Provides the two entry points of the library: metrics of one resource and
//! metrics of every resource of a service.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::MetricsError;
use crate::monitor::cache::{InMemoryMetricStore, MetricStore};
use crate::monitor::collector::MetricsCollector;
use crate::monitor::model::{MetricQuery, MetricResult, Provider, ServiceMetricQuery};
use crate::monitor::retry::RetryPolicy;
use crate::provider::{
    BackendRegistry, CredentialResolver, HttpMonitorBackend, ProviderMetricsBackend,
};

/// Main library instance for embedded usage
///
/// The `MetricsEngine` resolves the backend and credential of each request,
/// discovers the metrics a resource exposes, queries them with bounded retry
/// and falls back to the last cached value when a last-known query comes back
/// empty.
///
/// The engine is cheap to clone; clones share backends and the cache.
///
/// # Example
///
/// ```no_run
/// use cloud_metrics_library::{
///     Config, EnvCredentialResolver, MetricQuery, MetricsEngine, MonitoredResource, Provider,
///     ResourceKind,
/// };
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), cloud_metrics_library::MetricsError> {
/// let engine = MetricsEngine::new(Config::default(), Arc::new(EnvCredentialResolver))?;
/// engine.register_http_backends(&[Provider::HuaweiCloud]).await?;
///
/// let vm = MonitoredResource::new("vm-1", "web", ResourceKind::Vm, Provider::HuaweiCloud)
///     .with_property("region", "cn-southwest-2");
/// let metrics = engine
///     .get_metrics_for_resource(&MetricQuery::new(vm, "tenant-a").last_known_value())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MetricsEngine {
    config: Config,
    backends: BackendRegistry,
    store: Arc<dyn MetricStore>,
    collector: MetricsCollector,
}

impl MetricsEngine {
    /// Create an engine with an in-memory last-known-value cache
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::Config` if the configuration does not validate.
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Result<Self, MetricsError> {
        Self::with_store(config, credentials, Arc::new(InMemoryMetricStore::new()))
    }

    /// Create an engine backed by `store`
    pub fn with_store(
        config: Config,
        credentials: Arc<dyn CredentialResolver>,
        store: Arc<dyn MetricStore>,
    ) -> Result<Self, MetricsError> {
        config.validate()?;

        let backends = BackendRegistry::new();
        let collector = MetricsCollector::new(
            backends.clone(),
            credentials,
            store.clone(),
            RetryPolicy::from_config(&config.retry),
            config.window.clone(),
        );

        info!(
            max_retries = config.retry.max_retries,
            delay_millis = config.retry.delay_millis,
            "Metrics engine initialized"
        );

        Ok(Self {
            config,
            backends,
            store,
            collector,
        })
    }

    /// Create a configuration builder
    pub fn with_config_builder() -> crate::config::ConfigBuilder {
        crate::config::ConfigBuilder::new()
    }

    /// Register `backend` for its provider, replacing any previous one
    pub async fn register_backend(&self, backend: Arc<dyn ProviderMetricsBackend>) {
        info!(provider = %backend.provider(), "Registering metrics backend");
        self.backends.register(backend).await;
    }

    /// Register the HTTP monitoring backend for each of `providers`
    pub async fn register_http_backends(&self, providers: &[Provider]) -> Result<(), MetricsError> {
        for provider in providers {
            let backend = HttpMonitorBackend::new(*provider, &self.config.http)?;
            self.register_backend(Arc::new(backend)).await;
        }
        Ok(())
    }

    /// Providers with a registered backend
    pub async fn providers(&self) -> Vec<Provider> {
        self.backends.providers().await
    }

    /// Metrics of a single resource
    ///
    /// # Errors
    ///
    /// - `ResourceNotSupported` when the resource kind cannot be monitored
    /// - `CredentialNotFound` when no credential matches the provider and principal
    /// - `ProviderCommunication` when a provider call fails terminally
    #[instrument(skip(self, query), fields(resource_id = %query.resource.id))]
    pub async fn get_metrics_for_resource(
        &self,
        query: &MetricQuery,
    ) -> Result<Vec<MetricResult>, MetricsError> {
        self.collector.collect_resource_metrics(query).await
    }

    /// Metrics of every resource of a service, fetched with one batch query
    #[instrument(skip(self, query), fields(resources = query.resources.len()))]
    pub async fn get_metrics_for_service(
        &self,
        query: &ServiceMetricQuery,
    ) -> Result<Vec<MetricResult>, MetricsError> {
        self.collector.collect_service_metrics(query).await
    }

    /// Last-known-value cache shared by every request
    pub fn cache(&self) -> Arc<dyn MetricStore> {
        self.store.clone()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
