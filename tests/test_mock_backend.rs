//! Unit tests for MockProviderBackend scripting and state management

use chrono::Utc;
use cloud_metrics_library::error::ProviderError;
use cloud_metrics_library::monitor::model::QueryWindow;
use cloud_metrics_library::provider::BatchTarget;
use cloud_metrics_library::{
    Credential, CredentialType, MetricKind, MockOperation, MockProviderBackend, MonitoredResource,
    Provider, ProviderClient, ProviderMetricsBackend, ResourceKind,
};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn window() -> QueryWindow {
    let end = Utc::now();
    QueryWindow {
        start: end - chrono::Duration::minutes(5),
        end,
        period_secs: 1,
    }
}

async fn client(backend: &MockProviderBackend) -> Arc<dyn ProviderClient> {
    let credential = Credential::new(Provider::Scs, CredentialType::Variables);
    backend.build_client(&credential, "region-1").await.unwrap()
}

#[tokio::test]
async fn test_mock_backend_creation() {
    let backend = MockProviderBackend::new(Provider::Scs);

    assert_eq!(backend.provider(), Provider::Scs);
    assert_eq!(backend.metric_name_for(MetricKind::Mem), Some("mem_util"));
    assert_eq!(
        backend.kind_for_metric_name("network_outgoing_bytes_rate_inband"),
        Some(MetricKind::VmNetworkOutgoing)
    );
    assert!(backend.assert_calls(MockOperation::ListCatalog, 0).await.is_ok());
}

#[tokio::test]
async fn test_catalog_is_per_resource() {
    let backend = MockProviderBackend::new(Provider::Scs);
    backend.add_catalog_metric("vm-1", MetricKind::Cpu).await;
    let client = client(&backend).await;

    let vm1 = MonitoredResource::new("vm-1", "a", ResourceKind::Vm, Provider::Scs);
    let vm2 = MonitoredResource::new("vm-2", "b", ResourceKind::Vm, Provider::Scs);

    let catalog = client.list_metric_catalog(&vm1).await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].metric_name, "cpu_util");
    assert_eq!(catalog[0].dimensions[0].value, "vm-1");
    assert!(client.list_metric_catalog(&vm2).await.unwrap().is_empty());

    assert_eq!(backend.calls(MockOperation::ListCatalog).await, 2);
    assert_eq!(backend.client_regions().await, vec!["region-1".to_string()]);
}

#[tokio::test]
async fn test_queued_failures_are_consumed_in_order() {
    let backend = MockProviderBackend::new(Provider::Scs);
    let client = client(&backend).await;
    let vm = MonitoredResource::new("vm-1", "a", ResourceKind::Vm, Provider::Scs);
    let error = ProviderError::Transient {
        status: 429,
        message: "slow down".to_string(),
    };

    backend
        .fail_next(MockOperation::ListCatalog, error.clone(), 2)
        .await;

    assert_eq!(client.list_metric_catalog(&vm).await, Err(error.clone()));
    assert_eq!(client.list_metric_catalog(&vm).await, Err(error));
    assert_ok!(client.list_metric_catalog(&vm).await);
}

#[tokio::test]
async fn test_persistent_failure_until_cleared() {
    let backend = MockProviderBackend::new(Provider::Scs);
    let client = client(&backend).await;
    let vm = MonitoredResource::new("vm-1", "a", ResourceKind::Vm, Provider::Scs);

    backend
        .fail_always(
            MockOperation::ListCatalog,
            ProviderError::Transport("refused".to_string()),
        )
        .await;
    assert_err!(client.list_metric_catalog(&vm).await);
    assert_err!(client.list_metric_catalog(&vm).await);

    backend.clear_failures().await;
    assert_ok!(client.list_metric_catalog(&vm).await);
}

#[tokio::test]
async fn test_batch_returns_only_seeded_series() {
    let backend = MockProviderBackend::new(Provider::Scs);
    backend.add_catalog_metric("vm-1", MetricKind::Cpu).await;
    backend.add_catalog_metric("vm-2", MetricKind::Cpu).await;
    backend
        .set_samples("vm-2", MetricKind::Cpu, &[(1_700_000_000_000, 4.0)])
        .await;
    let client = client(&backend).await;

    let mut targets = Vec::new();
    for id in ["vm-1", "vm-2"] {
        let vm = MonitoredResource::new(id, id, ResourceKind::Vm, Provider::Scs);
        for descriptor in client.list_metric_catalog(&vm).await.unwrap() {
            targets.push(BatchTarget {
                resource_id: id.to_string(),
                descriptor,
            });
        }
    }

    let response = client
        .query_metric_range_batch(&targets, &window())
        .await
        .unwrap();

    assert_eq!(response.metrics.len(), 1);
    assert_eq!(response.metrics[0].dimensions[0].value, "vm-2");
    assert_eq!(response.metrics[0].datapoints[0].average, Some(4.0));
    assert_eq!(backend.batch_targets().await[0].len(), 2);
}

#[tokio::test]
async fn test_reset_calls() {
    let backend = MockProviderBackend::new(Provider::Scs);
    let client = client(&backend).await;
    let vm = MonitoredResource::new("vm-1", "a", ResourceKind::Vm, Provider::Scs);
    client.list_metric_catalog(&vm).await.unwrap();

    backend.reset_calls().await;

    assert_eq!(backend.calls(MockOperation::ListCatalog).await, 0);
    assert!(backend.client_regions().await.is_empty());
    assert!(backend.windows().await.is_empty());
}
