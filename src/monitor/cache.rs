//! Last-known-value metric cache
//!
//! Keyed store of the most recent non-empty metric result per
//! (provider, resource, kind). Entries are never expired; a write overwrites
//! the previous value for the same key.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::monitor::model::{MetricKind, MetricResult, Provider};

/// Composite cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Provider hosting the resource
    pub provider: Provider,
    /// Resource identifier
    pub resource_id: String,
    /// Metric kind
    pub kind: MetricKind,
}

impl CacheKey {
    /// Build a key
    pub fn new(provider: Provider, resource_id: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            provider,
            resource_id: resource_id.into(),
            kind,
        }
    }
}

/// Store backing the last-known-value fallback
///
/// Implementations must tolerate concurrent `get`/`put` from independent
/// requests without losing updates.
#[async_trait]
pub trait MetricStore: Send + Sync + std::fmt::Debug {
    /// Cached result for `key`, if any
    async fn get(&self, key: &CacheKey) -> Option<MetricResult>;

    /// Store `metric` under `key`, replacing any previous entry
    async fn put(&self, key: CacheKey, metric: MetricResult);
}

/// In-process metric store
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricStore {
    entries: Arc<RwLock<HashMap<CacheKey, MetricResult>>>,
}

impl InMemoryMetricStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn get(&self, key: &CacheKey) -> Option<MetricResult> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    async fn put(&self, key: CacheKey, metric: MetricResult) {
        debug!(
            provider = %key.provider,
            resource_id = %key.resource_id,
            kind = %key.kind,
            points = metric.data_points.len(),
            "Caching last known metric"
        );
        let mut entries = self.entries.write().await;
        entries.insert(key, metric);
    }
}
