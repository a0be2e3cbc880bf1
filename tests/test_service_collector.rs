//! Integration tests for per-service (batch) metric collection against the mock backend

use chrono::{Duration, Utc};
use cloud_metrics_library::error::ProviderError;
use cloud_metrics_library::{
    CacheKey, ConfigBuilder, Credential, CredentialType, MetricKind, MetricResult, MetricStore,
    MetricsEngine, MetricsError, MockOperation, MockProviderBackend, MonitoredResource, Provider,
    ResourceKind, ServiceMetricQuery, StaticCredentialResolver,
};
use std::sync::Arc;

const REGION: &str = "eu-west-0";
const PRINCIPAL: &str = "tenant-b";
const R1: &str = "vm-r1";
const R2: &str = "vm-r2";

fn vm(id: &str) -> MonitoredResource {
    MonitoredResource::new(id, format!("{}-name", id), ResourceKind::Vm, Provider::FlexibleEngine)
        .with_property("region", REGION)
}

fn millis(minutes_ago: i64) -> i64 {
    (Utc::now() - Duration::minutes(minutes_ago)).timestamp_millis()
}

async fn setup() -> (MetricsEngine, MockProviderBackend) {
    let credentials = StaticCredentialResolver::new();
    credentials
        .insert(
            PRINCIPAL,
            Credential::new(Provider::FlexibleEngine, CredentialType::Variables)
                .with_variable("access_key", "ak")
                .with_variable("secret_key", "sk"),
        )
        .await;

    let config = ConfigBuilder::new().retry_delay_millis(0).build().unwrap();
    let engine = MetricsEngine::new(config, Arc::new(credentials)).unwrap();

    let backend = MockProviderBackend::new(Provider::FlexibleEngine);
    engine.register_backend(Arc::new(backend.clone())).await;
    (engine, backend)
}

/// R1 exposes CPU and MEM, R2 only CPU
async fn seed_catalogs(backend: &MockProviderBackend) {
    backend.add_catalog_metric(R1, MetricKind::Cpu).await;
    backend.add_catalog_metric(R1, MetricKind::Mem).await;
    backend.add_catalog_metric(R2, MetricKind::Cpu).await;
}

fn find<'a>(
    metrics: &'a [MetricResult],
    resource_id: &str,
    kind: MetricKind,
) -> Option<&'a MetricResult> {
    metrics
        .iter()
        .find(|metric| metric.kind == kind && metric.resource_id_label() == Some(resource_id))
}

#[tokio::test]
async fn test_series_are_attributed_to_their_resource() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;
    backend.set_samples(R1, MetricKind::Cpu, &[(millis(2), 11.0)]).await;
    backend.set_samples(R1, MetricKind::Mem, &[(millis(2), 12.0)]).await;
    backend.set_samples(R2, MetricKind::Cpu, &[(millis(2), 21.0)]).await;

    let query = ServiceMetricQuery::new(vec![vm(R1), vm(R2)], PRINCIPAL).last_known_value();
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    assert_eq!(metrics.len(), 3);
    assert_eq!(find(&metrics, R1, MetricKind::Cpu).unwrap().data_points[0].value, 11.0);
    assert_eq!(find(&metrics, R1, MetricKind::Mem).unwrap().data_points[0].value, 12.0);
    assert_eq!(find(&metrics, R2, MetricKind::Cpu).unwrap().data_points[0].value, 21.0);
    assert!(find(&metrics, R2, MetricKind::Mem).is_none());
}

#[tokio::test]
async fn test_one_batch_query_per_request() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;

    let query = ServiceMetricQuery::new(vec![vm(R1), vm(R2)], PRINCIPAL);
    engine.get_metrics_for_service(&query).await.unwrap();

    backend.assert_calls(MockOperation::QueryRangeBatch, 1).await.unwrap();
    backend.assert_calls(MockOperation::QueryRange, 0).await.unwrap();
    backend.assert_calls(MockOperation::ListCatalog, 2).await.unwrap();

    let batches = backend.batch_targets().await;
    let targets: Vec<(&str, &str)> = batches[0]
        .iter()
        .map(|target| (target.resource_id.as_str(), target.descriptor.metric_name.as_str()))
        .collect();
    assert_eq!(
        targets,
        vec![(R1, "cpu_util"), (R1, "mem_util"), (R2, "cpu_util")]
    );
}

#[tokio::test]
async fn test_missing_series_without_cache_is_omitted() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;
    backend.set_samples(R1, MetricKind::Cpu, &[(millis(1), 5.0)]).await;

    let query = ServiceMetricQuery::new(vec![vm(R1), vm(R2)], PRINCIPAL).last_known_value();
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    assert_eq!(metrics.len(), 1);
    assert!(find(&metrics, R1, MetricKind::Cpu).is_some());
}

#[tokio::test]
async fn test_missing_series_is_filled_from_cache() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;
    backend.set_samples(R1, MetricKind::Cpu, &[(millis(1), 5.0)]).await;
    backend.set_samples(R2, MetricKind::Cpu, &[(millis(1), 7.0)]).await;

    let query = ServiceMetricQuery::new(vec![vm(R1), vm(R2)], PRINCIPAL).last_known_value();
    engine.get_metrics_for_service(&query).await.unwrap();

    // R2 stops reporting; its previous value comes from the cache
    backend.clear_samples(R2, MetricKind::Cpu).await;
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    assert_eq!(metrics.len(), 2);
    let r2 = find(&metrics, R2, MetricKind::Cpu).unwrap();
    assert_eq!(r2.data_points.len(), 1);
    assert_eq!(r2.data_points[0].value, 7.0);
}

#[tokio::test]
async fn test_empty_series_is_replaced_from_cache() {
    let (engine, backend) = setup().await;
    backend.add_catalog_metric(R1, MetricKind::Cpu).await;
    backend.set_samples(R1, MetricKind::Cpu, &[(millis(1), 3.0)]).await;

    let query = ServiceMetricQuery::new(vec![vm(R1)], PRINCIPAL).last_known_value();
    engine.get_metrics_for_service(&query).await.unwrap();

    backend.set_samples(R1, MetricKind::Cpu, &[]).await;
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].data_points[0].value, 3.0);
}

#[tokio::test]
async fn test_empty_series_without_cache_is_kept() {
    let (engine, backend) = setup().await;
    backend.add_catalog_metric(R1, MetricKind::Cpu).await;
    backend.set_samples(R1, MetricKind::Cpu, &[]).await;

    let query = ServiceMetricQuery::new(vec![vm(R1)], PRINCIPAL).last_known_value();
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    assert_eq!(metrics.len(), 1);
    assert!(metrics[0].is_empty());
}

#[tokio::test]
async fn test_live_results_are_cached_per_resource() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;
    backend.set_samples(R1, MetricKind::Mem, &[(millis(1), 40.0)]).await;
    backend.set_samples(R2, MetricKind::Cpu, &[(millis(1), 60.0)]).await;

    let query = ServiceMetricQuery::new(vec![vm(R1), vm(R2)], PRINCIPAL).last_known_value();
    engine.get_metrics_for_service(&query).await.unwrap();

    let cache = engine.cache();
    let r1_mem = cache
        .get(&CacheKey::new(Provider::FlexibleEngine, R1, MetricKind::Mem))
        .await
        .unwrap();
    assert_eq!(r1_mem.resource_id_label(), Some(R1));
    assert!(
        cache
            .get(&CacheKey::new(Provider::FlexibleEngine, R1, MetricKind::Cpu))
            .await
            .is_none()
    );
    assert!(
        cache
            .get(&CacheKey::new(Provider::HuaweiCloud, R2, MetricKind::Cpu))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_window_query_keeps_all_points() {
    let (engine, backend) = setup().await;
    backend.add_catalog_metric(R1, MetricKind::Cpu).await;
    let samples = [(millis(30), 1.0), (millis(10), 2.0), (millis(20), 3.0)];
    backend.set_samples(R1, MetricKind::Cpu, &samples).await;

    let end = Utc::now();
    let query = ServiceMetricQuery::new(vec![vm(R1)], PRINCIPAL)
        .with_window(end - Duration::hours(1), end);
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    let values: Vec<f64> = metrics[0].data_points.iter().map(|point| point.value).collect();
    assert_eq!(values, vec![1.0, 3.0, 2.0]);
}

#[tokio::test]
async fn test_client_built_once_for_first_region() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;
    backend.set_samples(R1, MetricKind::Cpu, &[(millis(1), 5.0)]).await;
    backend.set_samples(R2, MetricKind::Cpu, &[(millis(1), 7.0)]).await;
    let r2_elsewhere = vm(R2).with_property("region", "eu-west-1");

    let query = ServiceMetricQuery::new(vec![vm(R1), r2_elsewhere], PRINCIPAL).last_known_value();
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    assert_eq!(backend.client_regions().await, vec![REGION.to_string()]);
    backend.assert_calls(MockOperation::QueryRangeBatch, 1).await.unwrap();
    backend.assert_calls(MockOperation::ListCatalog, 2).await.unwrap();
    assert_eq!(find(&metrics, R2, MetricKind::Cpu).unwrap().data_points[0].value, 7.0);
}

#[tokio::test]
async fn test_nothing_discovered_skips_batch_query() {
    let (engine, backend) = setup().await;

    let query = ServiceMetricQuery::new(vec![vm(R1), vm(R2)], PRINCIPAL);
    let metrics = engine.get_metrics_for_service(&query).await.unwrap();

    assert!(metrics.is_empty());
    backend.assert_calls(MockOperation::QueryRangeBatch, 0).await.unwrap();
}

#[tokio::test]
async fn test_empty_service_is_rejected() {
    let (engine, _backend) = setup().await;

    let result = engine
        .get_metrics_for_service(&ServiceMetricQuery::new(Vec::new(), PRINCIPAL))
        .await;

    assert!(matches!(result, Err(MetricsError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_unsupported_member_rejects_the_service() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;
    let subnet =
        MonitoredResource::new("subnet-1", "net", ResourceKind::Subnet, Provider::FlexibleEngine)
            .with_property("region", REGION);

    let result = engine
        .get_metrics_for_service(&ServiceMetricQuery::new(vec![vm(R1), subnet], PRINCIPAL))
        .await;

    assert!(matches!(
        result,
        Err(MetricsError::ResourceNotSupported { kind: ResourceKind::Subnet, .. })
    ));
    backend.assert_calls(MockOperation::ListCatalog, 0).await.unwrap();
}

#[tokio::test]
async fn test_mixed_providers_are_rejected() {
    let (engine, _backend) = setup().await;
    let other = MonitoredResource::new("vm-x", "x", ResourceKind::Vm, Provider::HuaweiCloud)
        .with_property("region", REGION);

    let result = engine
        .get_metrics_for_service(&ServiceMetricQuery::new(vec![vm(R1), other], PRINCIPAL))
        .await;

    assert!(matches!(result, Err(MetricsError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_batch_failure_is_retried_then_reported() {
    let (engine, backend) = setup().await;
    seed_catalogs(&backend).await;
    backend
        .fail_always(
            MockOperation::QueryRangeBatch,
            ProviderError::Transient {
                status: 429,
                message: "Too Many Requests".to_string(),
            },
        )
        .await;

    let result = engine
        .get_metrics_for_service(&ServiceMetricQuery::new(vec![vm(R1), vm(R2)], PRINCIPAL))
        .await;

    match result {
        Err(MetricsError::ProviderCommunication { operation, attempts, .. }) => {
            assert_eq!(operation, "query_metric_range_batch");
            assert_eq!(attempts, 6);
        }
        other => panic!("expected ProviderCommunication, got {:?}", other),
    }
}
