//! Metric collectors
//!
//! Orchestrate credential resolution, discovery, retried provider queries,
//! shaping and cache fallback for a single resource or for every resource of
//! a service.

use chrono::Utc;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::WindowConfig;
use crate::error::MetricsError;
use crate::monitor::cache::MetricStore;
use crate::monitor::converter;
use crate::monitor::discovery::{discover, DiscoveredMetric};
use crate::monitor::fallback;
use crate::monitor::model::{
    MetricKind, MetricQuery, MetricResult, MonitoredResource, ServiceMetricQuery, REGION_PROPERTY,
};
use crate::monitor::retry::RetryPolicy;
use crate::provider::{
    BackendRegistry, BatchTarget, CredentialResolver, ProviderClient, ProviderMetricsBackend,
};

/// Collects metrics through the registered provider backends
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    backends: BackendRegistry,
    credentials: Arc<dyn CredentialResolver>,
    store: Arc<dyn MetricStore>,
    retry: RetryPolicy,
    windows: WindowConfig,
}

/// Client context shared by every call of one request
struct RequestContext {
    backend: Arc<dyn ProviderMetricsBackend>,
    client: Arc<dyn ProviderClient>,
}

fn ensure_monitorable(resource: &MonitoredResource) -> Result<(), MetricsError> {
    if resource.kind.is_monitorable() {
        Ok(())
    } else {
        Err(MetricsError::ResourceNotSupported {
            resource_id: resource.id.clone(),
            kind: resource.kind,
        })
    }
}

fn require_region(resource: &MonitoredResource) -> Result<&str, MetricsError> {
    resource.region().ok_or_else(|| {
        MetricsError::InvalidRequest(format!(
            "resource {} has no '{}' property",
            resource.id, REGION_PROPERTY
        ))
    })
}

impl MetricsCollector {
    /// Create a collector
    pub fn new(
        backends: BackendRegistry,
        credentials: Arc<dyn CredentialResolver>,
        store: Arc<dyn MetricStore>,
        retry: RetryPolicy,
        windows: WindowConfig,
    ) -> Self {
        Self {
            backends,
            credentials,
            store,
            retry,
            windows,
        }
    }

    /// Resolve backend, credential and client for `resource`
    async fn context_for(
        &self,
        resource: &MonitoredResource,
        principal_id: &str,
    ) -> Result<RequestContext, MetricsError> {
        let region = require_region(resource)?;
        let backend = self.backends.get(resource.provider).await?;
        let credential = self
            .credentials
            .get_credential(resource.provider, principal_id, backend.credential_type())
            .await?;
        let client = backend.build_client(&credential, region).await?;
        Ok(RequestContext { backend, client })
    }

    /// Metrics of a single resource
    ///
    /// Results follow discovery order, which is the declaration order of
    /// `MetricKind` when no kind filter is given.
    pub async fn collect_resource_metrics(
        &self,
        query: &MetricQuery,
    ) -> Result<Vec<MetricResult>, MetricsError> {
        let resource = &query.resource;
        ensure_monitorable(resource)?;
        let window = converter::resolve_window(
            query.window_start,
            query.window_end,
            query.granularity,
            query.only_last_known_value,
            &self.windows,
            Utc::now(),
        )?;

        let context = self.context_for(resource, &query.principal_id).await?;
        let discovered = discover(
            context.client.as_ref(),
            context.backend.as_ref(),
            resource,
            query.kind,
            &self.retry,
        )
        .await?;

        let mut metrics = Vec::with_capacity(discovered.len());
        for DiscoveredMetric { kind, descriptor } in &discovered {
            let response = self
                .retry
                .execute("query_metric_range", || {
                    context
                        .client
                        .query_metric_range(&resource.id, descriptor, &window)
                })
                .await?;

            let mut metric = converter::shape_metric(
                resource,
                *kind,
                &descriptor.metric_name,
                &response.datapoints,
                query.only_last_known_value,
            );
            if query.only_last_known_value {
                let store = self.store.as_ref();
                metric = fallback::apply_resource_fallback(store, resource.provider, metric).await;
            }
            metrics.push(metric);
        }

        info!(
            resource_id = %resource.id,
            provider = %resource.provider,
            metrics = metrics.len(),
            only_last_known_value = query.only_last_known_value,
            "Collected resource metrics"
        );

        Ok(metrics)
    }

    /// Metrics of every resource of a service
    ///
    /// Credential and region are taken from the first resource; all resources
    /// are expected to live in the same provider account and region.
    pub async fn collect_service_metrics(
        &self,
        query: &ServiceMetricQuery,
    ) -> Result<Vec<MetricResult>, MetricsError> {
        let first = query.resources.first().ok_or_else(|| {
            MetricsError::InvalidRequest("service request contains no resources".to_string())
        })?;

        for resource in &query.resources {
            ensure_monitorable(resource)?;
            if resource.provider != first.provider {
                return Err(MetricsError::InvalidRequest(format!(
                    "resource {} belongs to provider {} but the service uses {}",
                    resource.id, resource.provider, first.provider
                )));
            }
            if resource.region() != first.region() {
                warn!(
                    resource_id = %resource.id,
                    region = ?resource.region(),
                    service_region = ?first.region(),
                    "Resource region differs from the service, querying with the first region"
                );
            }
        }

        let window = converter::resolve_window(
            query.window_start,
            query.window_end,
            query.granularity,
            query.only_last_known_value,
            &self.windows,
            Utc::now(),
        )?;

        let context = self.context_for(first, &query.principal_id).await?;

        // try_join_all keeps input order, so results line up with resources
        let per_resource = try_join_all(query.resources.iter().map(|resource| {
            discover(
                context.client.as_ref(),
                context.backend.as_ref(),
                resource,
                query.kind,
                &self.retry,
            )
        }))
        .await?;

        let discovered: Vec<(&MonitoredResource, Vec<DiscoveredMetric>)> =
            query.resources.iter().zip(per_resource).collect();

        let targets: Vec<BatchTarget> = discovered
            .iter()
            .flat_map(|(resource, metrics)| {
                metrics.iter().map(move |metric| BatchTarget {
                    resource_id: resource.id.clone(),
                    descriptor: metric.descriptor.clone(),
                })
            })
            .collect();

        if targets.is_empty() {
            debug!(
                resources = query.resources.len(),
                "No metrics discovered for any resource of the service"
            );
            return Ok(Vec::new());
        }

        let response = self
            .retry
            .execute("query_metric_range_batch", || {
                context.client.query_metric_range_batch(&targets, &window)
            })
            .await?;

        let mut metrics =
            converter::shape_batch(&response, &discovered, query.only_last_known_value);

        if query.only_last_known_value {
            let pairs: Vec<(String, Vec<MetricKind>)> = discovered
                .iter()
                .map(|(resource, resource_metrics)| {
                    (
                        resource.id.clone(),
                        resource_metrics.iter().map(|metric| metric.kind).collect(),
                    )
                })
                .collect();
            let store = self.store.as_ref();
            metrics =
                fallback::apply_service_fallback(store, first.provider, &pairs, metrics).await;
        }

        info!(
            resources = query.resources.len(),
            targets = targets.len(),
            metrics = metrics.len(),
            provider = %first.provider,
            only_last_known_value = query.only_last_known_value,
            "Collected service metrics"
        );

        Ok(metrics)
    }
}
