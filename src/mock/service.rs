//! Mock provider backend for testing
//!
//! Provides an in-memory monitoring backend with a scriptable catalog, scripted
//! samples and injectable failures, so collectors can be exercised end to end
//! without a network.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{MetricsError, ProviderError};
use crate::monitor::model::{
    MetricDimension, MetricKind, MonitoredResource, Provider, ProviderMetricDescriptor,
    QueryWindow, RawBatchMetricResponse, RawBatchSeries, RawMetricResponse, RawSample,
};
use crate::provider::credential::Credential;
use crate::provider::{
    ces_metric_name, BatchTarget, ProviderClient, ProviderMetricsBackend, CES_NAMESPACE_SYS,
    INSTANCE_ID_DIMENSION,
};

/// Provider operations the mock records and can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// Catalog lookup
    ListCatalog,
    /// Single-metric range query
    QueryRange,
    /// Batch range query
    QueryRangeBatch,
}

/// Mock backend state
#[derive(Debug, Default)]
struct MockBackendState {
    /// Catalog entries per resource id
    catalogs: HashMap<String, Vec<ProviderMetricDescriptor>>,
    /// Samples per (resource id, metric name); absent keys return no series
    samples: HashMap<(String, String), Vec<RawSample>>,
    /// Failures returned before the next successful call
    queued_failures: HashMap<MockOperation, VecDeque<ProviderError>>,
    /// Failures returned on every call
    persistent_failures: HashMap<MockOperation, ProviderError>,
    /// Calls received per operation
    calls: HashMap<MockOperation, u32>,
    /// Regions clients were built for
    client_regions: Vec<String>,
    /// Windows received by range queries
    windows: Vec<QueryWindow>,
    /// Targets of every batch query
    batch_targets: Vec<Vec<BatchTarget>>,
}

/// Mock provider backend for testing
#[derive(Debug, Clone)]
pub struct MockProviderBackend {
    provider: Provider,
    state: Arc<RwLock<MockBackendState>>,
}

impl MockProviderBackend {
    /// Create a new mock backend for `provider`
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            state: Arc::new(RwLock::new(MockBackendState::default())),
        }
    }

    /// Add `kind` to the catalog of `resource_id`
    pub async fn add_catalog_metric(&self, resource_id: &str, kind: MetricKind) {
        let descriptor = ProviderMetricDescriptor {
            namespace: CES_NAMESPACE_SYS.to_string(),
            metric_name: ces_metric_name(kind).to_string(),
            unit: match kind {
                MetricKind::Cpu | MetricKind::Mem => "%".to_string(),
                _ => "Byte/s".to_string(),
            },
            dimensions: vec![MetricDimension {
                name: INSTANCE_ID_DIMENSION.to_string(),
                value: resource_id.to_string(),
            }],
        };
        let mut state = self.state.write().await;
        state
            .catalogs
            .entry(resource_id.to_string())
            .or_default()
            .push(descriptor);
    }

    /// Set the samples returned for `kind` of `resource_id` as (millis, value) pairs
    pub async fn set_samples(&self, resource_id: &str, kind: MetricKind, samples: &[(i64, f64)]) {
        let samples = samples
            .iter()
            .map(|(timestamp, value)| RawSample {
                timestamp: *timestamp,
                average: Some(*value),
                max: Some(*value),
                min: Some(*value),
            })
            .collect();
        let mut state = self.state.write().await;
        state.samples.insert(
            (resource_id.to_string(), ces_metric_name(kind).to_string()),
            samples,
        );
    }

    /// Stop returning samples for `kind` of `resource_id`
    pub async fn clear_samples(&self, resource_id: &str, kind: MetricKind) {
        let mut state = self.state.write().await;
        state
            .samples
            .remove(&(resource_id.to_string(), ces_metric_name(kind).to_string()));
    }

    /// Fail the next `times` calls of `operation` with `error`
    pub async fn fail_next(&self, operation: MockOperation, error: ProviderError, times: usize) {
        let mut state = self.state.write().await;
        let queue = state.queued_failures.entry(operation).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// Fail every call of `operation` with `error`
    pub async fn fail_always(&self, operation: MockOperation, error: ProviderError) {
        let mut state = self.state.write().await;
        state.persistent_failures.insert(operation, error);
    }

    /// Drop every scripted failure
    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.queued_failures.clear();
        state.persistent_failures.clear();
    }

    /// Number of calls received for `operation`
    pub async fn calls(&self, operation: MockOperation) -> u32 {
        let state = self.state.read().await;
        state.calls.get(&operation).copied().unwrap_or(0)
    }

    /// Assert the number of calls received for `operation`
    pub async fn assert_calls(
        &self,
        operation: MockOperation,
        expected: u32,
    ) -> Result<(), String> {
        let actual = self.calls(operation).await;
        if actual != expected {
            Err(format!(
                "Expected {} {:?} calls, but received {}",
                expected, operation, actual
            ))
        } else {
            Ok(())
        }
    }

    /// Regions clients were built for
    pub async fn client_regions(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.client_regions.clone()
    }

    /// Windows received by range queries
    pub async fn windows(&self) -> Vec<QueryWindow> {
        let state = self.state.read().await;
        state.windows.clone()
    }

    /// Targets of every batch query received
    pub async fn batch_targets(&self) -> Vec<Vec<BatchTarget>> {
        let state = self.state.read().await;
        state.batch_targets.clone()
    }

    /// Reset call counters and recorded requests (for test isolation)
    pub async fn reset_calls(&self) {
        let mut state = self.state.write().await;
        state.calls.clear();
        state.client_regions.clear();
        state.windows.clear();
        state.batch_targets.clear();
    }
}

#[async_trait]
impl ProviderMetricsBackend for MockProviderBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn metric_name_for(&self, kind: MetricKind) -> Option<&str> {
        Some(ces_metric_name(kind))
    }

    async fn build_client(
        &self,
        _credential: &Credential,
        region: &str,
    ) -> Result<Arc<dyn ProviderClient>, MetricsError> {
        let mut state = self.state.write().await;
        state.client_regions.push(region.to_string());
        Ok(Arc::new(MockProviderClient {
            state: self.state.clone(),
        }))
    }
}

/// Client handed out by `MockProviderBackend`
#[derive(Debug, Clone)]
struct MockProviderClient {
    state: Arc<RwLock<MockBackendState>>,
}

impl MockProviderClient {
    /// Record a call and return the scripted failure, if any
    async fn record(&self, operation: MockOperation) -> Result<(), ProviderError> {
        let mut state = self.state.write().await;
        *state.calls.entry(operation).or_insert(0) += 1;

        if let Some(error) = state
            .queued_failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            debug!(?operation, error = %error, "Mock returning queued failure");
            return Err(error);
        }
        if let Some(error) = state.persistent_failures.get(&operation) {
            return Err(error.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderClient for MockProviderClient {
    async fn list_metric_catalog(
        &self,
        resource: &MonitoredResource,
    ) -> Result<Vec<ProviderMetricDescriptor>, ProviderError> {
        self.record(MockOperation::ListCatalog).await?;
        let state = self.state.read().await;
        Ok(state.catalogs.get(&resource.id).cloned().unwrap_or_default())
    }

    async fn query_metric_range(
        &self,
        resource_id: &str,
        descriptor: &ProviderMetricDescriptor,
        window: &QueryWindow,
    ) -> Result<RawMetricResponse, ProviderError> {
        self.record(MockOperation::QueryRange).await?;
        let mut state = self.state.write().await;
        state.windows.push(*window);
        let datapoints = state
            .samples
            .get(&(resource_id.to_string(), descriptor.metric_name.clone()))
            .cloned()
            .unwrap_or_default();
        Ok(RawMetricResponse {
            metric_name: descriptor.metric_name.clone(),
            datapoints,
        })
    }

    async fn query_metric_range_batch(
        &self,
        targets: &[BatchTarget],
        window: &QueryWindow,
    ) -> Result<RawBatchMetricResponse, ProviderError> {
        self.record(MockOperation::QueryRangeBatch).await?;
        let mut state = self.state.write().await;
        state.windows.push(*window);
        state.batch_targets.push(targets.to_vec());

        let metrics = targets
            .iter()
            .filter_map(|target| {
                state
                    .samples
                    .get(&(
                        target.resource_id.clone(),
                        target.descriptor.metric_name.clone(),
                    ))
                    .map(|samples| RawBatchSeries {
                        namespace: target.descriptor.namespace.clone(),
                        metric_name: target.descriptor.metric_name.clone(),
                        dimensions: vec![MetricDimension {
                            name: INSTANCE_ID_DIMENSION.to_string(),
                            value: target.resource_id.clone(),
                        }],
                        datapoints: samples.clone(),
                    })
            })
            .collect();

        Ok(RawBatchMetricResponse { metrics })
    }
}
