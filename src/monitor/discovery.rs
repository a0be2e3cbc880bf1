//! Metric discovery
//!
//! Resolves which provider metrics apply to a resource by consulting the
//! provider catalog once (retried) and matching every requested kind against it.

use tracing::{debug, warn};

use crate::error::MetricsError;
use crate::monitor::model::{MetricKind, MonitoredResource, ProviderMetricDescriptor};
use crate::monitor::retry::RetryPolicy;
use crate::provider::{ProviderClient, ProviderMetricsBackend};

/// A metric kind resolved against the provider catalog
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredMetric {
    /// Metric kind
    pub kind: MetricKind,
    /// Catalog entry serving the kind
    pub descriptor: ProviderMetricDescriptor,
}

/// Discover the metrics of `resource`
///
/// With a kind filter at most one entry is returned. Without one, every kind
/// is resolved in declaration order and kinds missing from the catalog are
/// skipped. Only provider failures are errors.
pub async fn discover(
    client: &dyn ProviderClient,
    backend: &dyn ProviderMetricsBackend,
    resource: &MonitoredResource,
    kind_filter: Option<MetricKind>,
    retry: &RetryPolicy,
) -> Result<Vec<DiscoveredMetric>, MetricsError> {
    let catalog = retry
        .execute("list_metric_catalog", || client.list_metric_catalog(resource))
        .await?;

    debug!(
        resource_id = %resource.id,
        catalog_size = catalog.len(),
        "Fetched metric catalog"
    );

    Ok(match_catalog(backend, resource, &catalog, kind_filter))
}

/// Match the requested kinds against an already fetched catalog
pub fn match_catalog(
    backend: &dyn ProviderMetricsBackend,
    resource: &MonitoredResource,
    catalog: &[ProviderMetricDescriptor],
    kind_filter: Option<MetricKind>,
) -> Vec<DiscoveredMetric> {
    let kinds: Vec<MetricKind> = match kind_filter {
        Some(kind) => vec![kind],
        None => MetricKind::ALL.to_vec(),
    };

    let mut discovered = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let descriptor = backend.metric_name_for(kind).and_then(|metric_name| {
            catalog
                .iter()
                .find(|descriptor| descriptor.metric_name == metric_name)
        });

        match descriptor {
            Some(descriptor) => discovered.push(DiscoveredMetric {
                kind,
                descriptor: descriptor.clone(),
            }),
            None => warn!(
                resource_id = %resource.id,
                kind = %kind,
                "Could not find metric of the resource in the provider catalog"
            ),
        }
    }
    discovered
}
