//! Metric model
//!
//! Value objects shared by discovery, collectors and the cache: the monitored
//! resource, the metric kinds, query requests and the uniform metric result.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Property key holding the region of a monitored resource
pub const REGION_PROPERTY: &str = "region";

/// Label key holding the owning resource id of a metric result
pub const RESOURCE_ID_LABEL: &str = "id";

/// Label key holding the owning resource name of a metric result
pub const RESOURCE_NAME_LABEL: &str = "name";

/// Cloud provider hosting the monitored resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Huawei Cloud (CES monitoring)
    HuaweiCloud,
    /// Orange Flexible Engine (CES-compatible monitoring)
    FlexibleEngine,
    /// OpenStack with a Gnocchi-style metrics service
    OpenStack,
    /// Sovereign Cloud Stack
    Scs,
}

impl Provider {
    /// Stable lowercase identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::HuaweiCloud => "huawei_cloud",
            Provider::FlexibleEngine => "flexible_engine",
            Provider::OpenStack => "open_stack",
            Provider::Scs => "scs",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a deployed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Virtual machine
    Vm,
    /// Block storage volume
    Volume,
    /// Virtual private cloud
    Vpc,
    /// Security group
    SecurityGroup,
    /// Subnet
    Subnet,
    /// SSH key pair
    KeyPair,
    /// Public/elastic IP
    PublicIp,
    /// Anything the deployment layer could not classify
    #[serde(other)]
    Unknown,
}

impl ResourceKind {
    /// Whether the provider monitoring backends expose metrics for this kind
    pub fn is_monitorable(&self) -> bool {
        matches!(self, ResourceKind::Vm)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Vm => "vm",
            ResourceKind::Volume => "volume",
            ResourceKind::Vpc => "vpc",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::Subnet => "subnet",
            ResourceKind::KeyPair => "key_pair",
            ResourceKind::PublicIp => "public_ip",
            ResourceKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A deployed resource whose metrics are collected
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitoredResource {
    /// Stable provider-side identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Resource kind
    pub kind: ResourceKind,
    /// Provider hosting the resource
    pub provider: Provider,
    /// Provider-specific properties (at least `region`)
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl MonitoredResource {
    /// Create a resource without properties
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ResourceKind,
        provider: Provider,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            provider,
            properties: HashMap::new(),
        }
    }

    /// Add a provider-specific property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Region the resource lives in
    pub fn region(&self) -> Option<&str> {
        self.properties.get(REGION_PROPERTY).map(String::as_str)
    }
}

/// Supported metric categories
///
/// Declaration order is the discovery order used when no kind filter is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// CPU utilization
    Cpu,
    /// Memory utilization
    Mem,
    /// Inbound network throughput
    VmNetworkIncoming,
    /// Outbound network throughput
    VmNetworkOutgoing,
}

impl MetricKind {
    /// Every kind, in declaration order
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Cpu,
        MetricKind::Mem,
        MetricKind::VmNetworkIncoming,
        MetricKind::VmNetworkOutgoing,
    ];

    /// Canonical name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Mem => "mem",
            MetricKind::VmNetworkIncoming => "vm_network_incoming",
            MetricKind::VmNetworkOutgoing => "vm_network_outgoing",
        }
    }

    /// Parse a canonical name; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Unit values of this kind are reported in
    pub fn unit(&self) -> MetricUnit {
        match self {
            MetricKind::Cpu | MetricKind::Mem => MetricUnit::Percentage,
            MetricKind::VmNetworkIncoming | MetricKind::VmNetworkOutgoing => {
                MetricUnit::KiloBytesPerSecond
            }
        }
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU usage",
            MetricKind::Mem => "Memory usage",
            MetricKind::VmNetworkIncoming => "Inbound network traffic",
            MetricKind::VmNetworkOutgoing => "Outbound network traffic",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    /// Percent (0-100)
    Percentage,
    /// Kilobytes per second
    KiloBytesPerSecond,
}

/// Type of a metric series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Point-in-time measurement
    Gauge,
}

/// A single sample
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct DataPoint {
    /// Sample time
    pub timestamp: DateTime<Utc>,
    /// Sample value
    pub value: f64,
}

impl DataPoint {
    /// Build a point from a provider timestamp in milliseconds
    pub fn from_millis(timestamp_millis: i64, value: f64) -> Option<Self> {
        Utc.timestamp_millis_opt(timestamp_millis)
            .single()
            .map(|timestamp| Self { timestamp, value })
    }
}

/// Uniform metric result returned to callers
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricResult {
    /// Owning resource
    pub resource_id: String,
    /// Metric kind
    pub kind: MetricKind,
    /// Provider-side metric name the data came from
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Series type
    pub metric_type: MetricType,
    /// Value unit
    pub unit: MetricUnit,
    /// Labels; always carries the owning resource id under `id`
    pub labels: BTreeMap<String, String>,
    /// Samples, ascending by timestamp
    pub data_points: Vec<DataPoint>,
}

impl MetricResult {
    /// Whether the provider returned no samples
    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    /// Resource id stored in the labels
    pub fn resource_id_label(&self) -> Option<&str> {
        self.labels.get(RESOURCE_ID_LABEL).map(String::as_str)
    }
}

/// Metrics request for a single resource
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricQuery {
    /// Resource to query
    pub resource: MonitoredResource,
    /// Kind filter; `None` means every kind
    #[serde(default)]
    pub kind: Option<MetricKind>,
    /// Start of the window
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    /// End of the window
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
    /// Aggregation period in seconds; derived from the window when absent
    #[serde(default)]
    pub granularity: Option<u32>,
    /// Only the most recent known value is wanted
    #[serde(default)]
    pub only_last_known_value: bool,
    /// Principal whose credential is used
    pub principal_id: String,
}

impl MetricQuery {
    /// Query every kind of `resource` over the provider default window
    pub fn new(resource: MonitoredResource, principal_id: impl Into<String>) -> Self {
        Self {
            resource,
            kind: None,
            window_start: None,
            window_end: None,
            granularity: None,
            only_last_known_value: false,
            principal_id: principal_id.into(),
        }
    }

    /// Restrict the query to one kind
    pub fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the query window
    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    /// Ask only for the last known value
    pub fn last_known_value(mut self) -> Self {
        self.only_last_known_value = true;
        self
    }
}

/// Metrics request for every resource of a service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceMetricQuery {
    /// Resources of the service; order is preserved when correlating results
    pub resources: Vec<MonitoredResource>,
    /// Kind filter; `None` means every kind
    #[serde(default)]
    pub kind: Option<MetricKind>,
    /// Start of the window
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    /// End of the window
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
    /// Aggregation period in seconds; derived from the window when absent
    #[serde(default)]
    pub granularity: Option<u32>,
    /// Only the most recent known value is wanted
    #[serde(default)]
    pub only_last_known_value: bool,
    /// Principal whose credential is used
    pub principal_id: String,
}

impl ServiceMetricQuery {
    /// Query every kind of `resources` over the provider default window
    pub fn new(resources: Vec<MonitoredResource>, principal_id: impl Into<String>) -> Self {
        Self {
            resources,
            kind: None,
            window_start: None,
            window_end: None,
            granularity: None,
            only_last_known_value: false,
            principal_id: principal_id.into(),
        }
    }

    /// Restrict the query to one kind
    pub fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the query window
    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    /// Ask only for the last known value
    pub fn last_known_value(mut self) -> Self {
        self.only_last_known_value = true;
        self
    }
}

/// A metric as listed in the provider catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ProviderMetricDescriptor {
    /// Provider namespace (e.g. `SYS.ECS`)
    pub namespace: String,
    /// Provider metric name (e.g. `cpu_util`)
    pub metric_name: String,
    /// Unit reported by the catalog
    #[serde(default)]
    pub unit: String,
    /// Dimensions identifying the measured object
    #[serde(default)]
    pub dimensions: Vec<MetricDimension>,
}

/// Name/value pair identifying the measured object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct MetricDimension {
    /// Dimension name
    pub name: String,
    /// Dimension value
    pub value: String,
}

/// Query window resolved from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    /// Window start
    pub start: DateTime<Utc>,
    /// Window end
    pub end: DateTime<Utc>,
    /// Aggregation period in seconds
    pub period_secs: u32,
}

/// Raw sample as returned by the provider
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawSample {
    /// Sample time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Averaged value over the period
    #[serde(default)]
    pub average: Option<f64>,
    /// Maximum value over the period
    #[serde(default)]
    pub max: Option<f64>,
    /// Minimum value over the period
    #[serde(default)]
    pub min: Option<f64>,
}

/// Raw response of a single-metric range query
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawMetricResponse {
    /// Provider metric name
    #[serde(default)]
    pub metric_name: String,
    /// Samples, in provider order
    #[serde(default)]
    pub datapoints: Vec<RawSample>,
}

/// One series of a batch range query response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawBatchSeries {
    /// Provider namespace
    pub namespace: String,
    /// Provider metric name
    pub metric_name: String,
    /// Dimensions identifying the measured object
    #[serde(default)]
    pub dimensions: Vec<MetricDimension>,
    /// Samples, in provider order
    #[serde(default)]
    pub datapoints: Vec<RawSample>,
}

/// Raw response of a batch range query
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawBatchMetricResponse {
    /// Returned series; series without data may be missing
    #[serde(default)]
    pub metrics: Vec<RawBatchSeries>,
}
