//! Metrics retrieval engine
//!
//! Discovery, retried provider queries, result shaping and the
//! last-known-value cache fallback.

pub mod cache;
pub mod collector;
pub mod converter;
pub mod discovery;
pub mod fallback;
pub mod model;
pub mod retry;

pub use cache::{CacheKey, InMemoryMetricStore, MetricStore};
pub use collector::MetricsCollector;
pub use discovery::{discover, DiscoveredMetric};
pub use model::{
    DataPoint, MetricDimension, MetricKind, MetricQuery, MetricResult, MetricType, MetricUnit,
    MonitoredResource, Provider, ProviderMetricDescriptor, QueryWindow, RawBatchMetricResponse,
    RawBatchSeries, RawMetricResponse, RawSample, ResourceKind, ServiceMetricQuery,
};
pub use retry::{Backoff, RetryPolicy};
