//! Last-known-value cache fallback
//!
//! Only applied to requests asking for the last known value. The live query
//! always runs first; the cache is written on non-empty live results and read
//! when the live result is empty or missing.

use tracing::debug;

use crate::monitor::cache::{CacheKey, MetricStore};
use crate::monitor::model::{MetricKind, MetricResult, Provider};

/// Cached entry for `key` if it holds data
async fn cached_non_empty(store: &dyn MetricStore, key: &CacheKey) -> Option<MetricResult> {
    store.get(key).await.filter(|cached| !cached.is_empty())
}

/// Fallback for one live result of a single-resource request
///
/// A cache miss keeps the empty live result.
pub async fn apply_resource_fallback(
    store: &dyn MetricStore,
    provider: Provider,
    live: MetricResult,
) -> MetricResult {
    let key = CacheKey::new(provider, live.resource_id.clone(), live.kind);
    if !live.is_empty() {
        store.put(key, live.clone()).await;
        return live;
    }

    match cached_non_empty(store, &key).await {
        Some(cached) => {
            debug!(
                resource_id = %key.resource_id,
                kind = %key.kind,
                "Live query returned no data, using cached metric"
            );
            cached
        }
        None => live,
    }
}

/// Fallback over every discovered (resource, kind) pair of a service request
///
/// Present non-empty results are cached. Present empty results are replaced by
/// a cached entry when one exists. Missing pairs are appended from the cache,
/// or omitted when the cache has nothing for them.
pub async fn apply_service_fallback(
    store: &dyn MetricStore,
    provider: Provider,
    discovered: &[(String, Vec<MetricKind>)],
    mut metrics: Vec<MetricResult>,
) -> Vec<MetricResult> {
    for (resource_id, kinds) in discovered {
        for kind in kinds {
            let key = CacheKey::new(provider, resource_id.clone(), *kind);
            let position = metrics.iter().position(|metric| {
                metric.kind == *kind && metric.resource_id_label() == Some(resource_id.as_str())
            });

            match position {
                Some(index) if !metrics[index].is_empty() => {
                    store.put(key, metrics[index].clone()).await;
                }
                Some(index) => {
                    if let Some(cached) = cached_non_empty(store, &key).await {
                        metrics[index] = cached;
                    }
                }
                None => match cached_non_empty(store, &key).await {
                    Some(cached) => metrics.push(cached),
                    None => debug!(
                        resource_id = %resource_id,
                        kind = %kind,
                        "No live or cached metric, omitting"
                    ),
                },
            }
        }
    }
    metrics
}
