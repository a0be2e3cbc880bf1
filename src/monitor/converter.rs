//! Result shaping
//!
//! Converts raw provider samples into `MetricResult`s and resolves the query
//! window (including the aggregation period) sent to the provider.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::config::WindowConfig;
use crate::error::MetricsError;
use crate::monitor::discovery::DiscoveredMetric;
use crate::monitor::model::{
    DataPoint, MetricKind, MetricResult, MetricType, MonitoredResource, QueryWindow,
    RawBatchMetricResponse, RawBatchSeries, RawSample, RESOURCE_ID_LABEL, RESOURCE_NAME_LABEL,
};
use crate::provider::INSTANCE_ID_DIMENSION;

/// Period used for last-known-value queries (raw samples)
pub const RAW_PERIOD_SECS: u32 = 1;

const ONE_DAY_SECS: i64 = 86_400;

/// Aggregation period for a window spanning `span`
pub fn period_for_span(span: Duration) -> u32 {
    let secs = span.num_seconds();
    if secs <= ONE_DAY_SECS {
        300
    } else if secs <= 3 * ONE_DAY_SECS {
        1200
    } else if secs <= 10 * ONE_DAY_SECS {
        3600
    } else if secs <= 30 * ONE_DAY_SECS {
        14_400
    } else {
        86_400
    }
}

/// Window sent to the provider for a request
///
/// Last-known-value requests ignore the requested bounds and look back over
/// the configured short window with raw samples.
pub fn resolve_window(
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    granularity: Option<u32>,
    only_last_known_value: bool,
    config: &WindowConfig,
    now: DateTime<Utc>,
) -> Result<QueryWindow, MetricsError> {
    if only_last_known_value {
        return Ok(QueryWindow {
            start: look_back(now, config.last_known_window_secs)?,
            end: now,
            period_secs: RAW_PERIOD_SECS,
        });
    }

    let end = window_end.unwrap_or(now);
    let start = match window_start {
        Some(start) => start,
        None => look_back(end, config.default_window_secs)?,
    };
    if start > end {
        return Err(MetricsError::InvalidRequest(format!(
            "window start {} is after window end {}",
            start, end
        )));
    }

    let period_secs = match granularity {
        Some(0) => {
            return Err(MetricsError::InvalidRequest(
                "granularity must be greater than 0".to_string(),
            ));
        }
        Some(period) => period,
        None => period_for_span(end - start),
    };

    Ok(QueryWindow {
        start,
        end,
        period_secs,
    })
}

/// `secs` before `end`, or an error when that instant is not representable
fn look_back(end: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>, MetricsError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|span| end.checked_sub_signed(span))
        .ok_or_else(|| {
            MetricsError::InvalidRequest(format!(
                "window of {}s before {} is out of range",
                secs, end
            ))
        })
}

/// Ascending data points from raw samples; samples without a value are dropped
pub fn data_points(samples: &[RawSample]) -> Vec<DataPoint> {
    let mut points: Vec<DataPoint> = samples
        .iter()
        .filter_map(|sample| {
            sample
                .average
                .and_then(|value| DataPoint::from_millis(sample.timestamp, value))
        })
        .collect();
    points.sort_by_key(|point| point.timestamp);
    points
}

/// Shape raw samples of one metric of `resource`
pub fn shape_metric(
    resource: &MonitoredResource,
    kind: MetricKind,
    metric_name: &str,
    samples: &[RawSample],
    only_last_known_value: bool,
) -> MetricResult {
    let mut points = data_points(samples);
    if only_last_known_value && points.len() > 1 {
        points.drain(..points.len() - 1);
    }

    let mut labels = BTreeMap::new();
    labels.insert(RESOURCE_ID_LABEL.to_string(), resource.id.clone());
    labels.insert(RESOURCE_NAME_LABEL.to_string(), resource.name.clone());

    MetricResult {
        resource_id: resource.id.clone(),
        kind,
        name: metric_name.to_string(),
        description: kind.description().to_string(),
        metric_type: MetricType::Gauge,
        unit: kind.unit(),
        labels,
        data_points: points,
    }
}

/// Series of `response` belonging to `resource_id` and `metric_name`
fn find_series<'a>(
    response: &'a RawBatchMetricResponse,
    resource_id: &str,
    metric_name: &str,
) -> Option<&'a RawBatchSeries> {
    response.metrics.iter().find(|series| {
        series.metric_name == metric_name
            && series.dimensions.iter().any(|dimension| {
                dimension.name == INSTANCE_ID_DIMENSION && dimension.value == resource_id
            })
    })
}

/// Shape a batch response into one result per discovered pair it contains
///
/// A series is attributed to a resource only when its `instance_id` dimension
/// carries that resource id; pairs without a returned series are skipped.
pub fn shape_batch(
    response: &RawBatchMetricResponse,
    discovered: &[(&MonitoredResource, Vec<DiscoveredMetric>)],
    only_last_known_value: bool,
) -> Vec<MetricResult> {
    let mut metrics = Vec::new();
    for (resource, resource_metrics) in discovered {
        for discovered_metric in resource_metrics {
            let metric_name = discovered_metric.descriptor.metric_name.as_str();
            if let Some(series) = find_series(response, &resource.id, metric_name) {
                metrics.push(shape_metric(
                    resource,
                    discovered_metric.kind,
                    metric_name,
                    &series.datapoints,
                    only_last_known_value,
                ));
            }
        }
    }
    metrics
}
