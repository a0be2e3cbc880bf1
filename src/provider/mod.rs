//! Provider capability interfaces
//!
//! Collectors depend only on these traits. Each cloud provider contributes one
//! `ProviderMetricsBackend`, selected at request time through the
//! `BackendRegistry` by the provider carried on the resource.

pub mod credential;
pub mod http;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{MetricsError, ProviderError};
use crate::monitor::model::{
    MetricKind, MonitoredResource, Provider, ProviderMetricDescriptor, QueryWindow,
    RawBatchMetricResponse, RawMetricResponse,
};

pub use credential::{
    Credential, CredentialResolver, CredentialType, EnvCredentialResolver,
    StaticCredentialResolver,
};
pub use http::{HttpMonitorBackend, HttpMonitorClient};

/// Namespace of the hypervisor-level metrics
pub const CES_NAMESPACE_SYS: &str = "SYS.ECS";

/// Dimension carrying the instance id
pub const INSTANCE_ID_DIMENSION: &str = "instance_id";

/// CES metric name for `kind`
pub fn ces_metric_name(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Cpu => "cpu_util",
        MetricKind::Mem => "mem_util",
        MetricKind::VmNetworkIncoming => "network_incoming_bytes_rate_inband",
        MetricKind::VmNetworkOutgoing => "network_outgoing_bytes_rate_inband",
    }
}

/// One (resource, metric) pair of a batch range query
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTarget {
    /// Resource the metric belongs to
    pub resource_id: String,
    /// Metric as listed in the catalog
    pub descriptor: ProviderMetricDescriptor,
}

/// Client bound to one credential and region
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Metrics the provider exposes for `resource`
    async fn list_metric_catalog(
        &self,
        resource: &MonitoredResource,
    ) -> Result<Vec<ProviderMetricDescriptor>, ProviderError>;

    /// Samples of one metric over `window`
    async fn query_metric_range(
        &self,
        resource_id: &str,
        descriptor: &ProviderMetricDescriptor,
        window: &QueryWindow,
    ) -> Result<RawMetricResponse, ProviderError>;

    /// Samples of every target over `window` in one call
    async fn query_metric_range_batch(
        &self,
        targets: &[BatchTarget],
        window: &QueryWindow,
    ) -> Result<RawBatchMetricResponse, ProviderError>;
}

/// Provider-specific part of metric collection
#[async_trait]
pub trait ProviderMetricsBackend: Send + Sync + std::fmt::Debug {
    /// Provider served by this backend
    fn provider(&self) -> Provider;

    /// Credential form the backend needs
    fn credential_type(&self) -> CredentialType {
        CredentialType::Variables
    }

    /// Provider metric name for `kind`; `None` if the provider has no such metric
    fn metric_name_for(&self, kind: MetricKind) -> Option<&str>;

    /// Kind for a provider metric name
    fn kind_for_metric_name(&self, metric_name: &str) -> Option<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| self.metric_name_for(*kind) == Some(metric_name))
    }

    /// Build a client for `region` using `credential`
    async fn build_client(
        &self,
        credential: &Credential,
        region: &str,
    ) -> Result<Arc<dyn ProviderClient>, MetricsError>;
}

/// Backends keyed by provider
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: Arc<RwLock<HashMap<Provider, Arc<dyn ProviderMetricsBackend>>>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend`, replacing any backend of the same provider
    pub async fn register(&self, backend: Arc<dyn ProviderMetricsBackend>) {
        let mut backends = self.backends.write().await;
        backends.insert(backend.provider(), backend);
    }

    /// Backend serving `provider`
    pub async fn get(
        &self,
        provider: Provider,
    ) -> Result<Arc<dyn ProviderMetricsBackend>, MetricsError> {
        let backends = self.backends.read().await;
        backends
            .get(&provider)
            .cloned()
            .ok_or(MetricsError::BackendNotRegistered(provider))
    }

    /// Providers with a registered backend
    pub async fn providers(&self) -> Vec<Provider> {
        let backends = self.backends.read().await;
        let mut providers: Vec<_> = backends.keys().copied().collect();
        providers.sort();
        providers
    }
}
