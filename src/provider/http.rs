//! HTTP monitoring backend
//!
//! Talks to a CES-style monitoring REST API:
//!
//! - `GET  {base}/V1.0/{project_id}/metrics` lists the metric catalog
//! - `GET  {base}/V1.0/{project_id}/metric-data` returns one series
//! - `POST {base}/V1.0/{project_id}/batch-query-metric-data` returns many series
//!
//! Status 429 and 500 are reported as transient errors, every other non-2xx
//! status as a rejection.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::HttpBackendConfig;
use crate::error::{MetricsConfigError, MetricsError, ProviderError};
use crate::monitor::model::{
    MetricDimension, MetricKind, MonitoredResource, Provider, ProviderMetricDescriptor,
    QueryWindow, RawBatchMetricResponse, RawMetricResponse,
};
use crate::provider::credential::{variables, Credential};
use crate::provider::{
    ces_metric_name, BatchTarget, ProviderClient, ProviderMetricsBackend, INSTANCE_ID_DIMENSION,
};

/// Header carrying the API token
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Statistic requested from the provider
const FILTER_AVERAGE: &str = "average";

/// Backend for providers exposing the CES REST API
#[derive(Debug, Clone)]
pub struct HttpMonitorBackend {
    provider: Provider,
    config: HttpBackendConfig,
    http: reqwest::Client,
}

impl HttpMonitorBackend {
    /// Create a backend for `provider`
    pub fn new(provider: Provider, config: &HttpBackendConfig) -> Result<Self, MetricsError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                MetricsConfigError::ValidationFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            provider = %provider,
            endpoint_template = %config.endpoint_template,
            "Created HTTP monitoring backend"
        );

        Ok(Self {
            provider,
            config: config.clone(),
            http,
        })
    }
}

#[async_trait]
impl ProviderMetricsBackend for HttpMonitorBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn metric_name_for(&self, kind: MetricKind) -> Option<&str> {
        Some(ces_metric_name(kind))
    }

    async fn build_client(
        &self,
        credential: &Credential,
        region: &str,
    ) -> Result<Arc<dyn ProviderClient>, MetricsError> {
        let endpoint = self.config.endpoint_for_region(region);
        let base_url = Url::parse(&endpoint)
            .map_err(|e| MetricsConfigError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        let project_id = credential
            .require(variables::PROJECT_ID)?
            .expose_secret()
            .clone();
        let token = credential
            .variable(variables::AUTH_TOKEN)
            .map(|token| SecretString::new(token.expose_secret().clone()));

        debug!(
            provider = %self.provider,
            region,
            base_url = %base_url,
            "Built HTTP monitoring client"
        );

        Ok(Arc::new(HttpMonitorClient {
            http: self.http.clone(),
            base_url,
            project_id,
            token,
        }))
    }
}

/// Client bound to one project, region and token
#[derive(Debug)]
pub struct HttpMonitorClient {
    http: reqwest::Client,
    base_url: Url,
    project_id: String,
    token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct ListMetricsResponse {
    #[serde(default)]
    metrics: Vec<ProviderMetricDescriptor>,
}

#[derive(Debug, Serialize)]
struct BatchMetricSelector<'a> {
    namespace: &'a str,
    metric_name: &'a str,
    dimensions: Vec<MetricDimension>,
}

#[derive(Debug, Serialize)]
struct BatchQueryBody<'a> {
    metrics: Vec<BatchMetricSelector<'a>>,
    from: i64,
    to: i64,
    period: String,
    filter: &'static str,
}

impl HttpMonitorClient {
    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let raw = format!("{}/V1.0/{}/{}", base, self.project_id, path);
        Url::parse(&raw)
            .map_err(|e| ProviderError::Transport(format!("Invalid URL {}: {}", raw, e)))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            // Expose secret only when needed for HTTP header
            Some(token) => request.header(AUTH_TOKEN_HEADER, token.expose_secret()),
            None => request,
        }
    }

    async fn send<T>(&self, request: reqwest::RequestBuilder) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .with_auth(request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// `dim.0` query value for `resource_id`
fn dimension_param(descriptor: &ProviderMetricDescriptor, resource_id: &str) -> String {
    match descriptor.dimensions.first() {
        Some(dimension) => format!("{},{}", dimension.name, dimension.value),
        None => format!("{},{}", INSTANCE_ID_DIMENSION, resource_id),
    }
}

fn dimensions_for(target: &BatchTarget) -> Vec<MetricDimension> {
    if target.descriptor.dimensions.is_empty() {
        vec![MetricDimension {
            name: INSTANCE_ID_DIMENSION.to_string(),
            value: target.resource_id.clone(),
        }]
    } else {
        target.descriptor.dimensions.clone()
    }
}

#[async_trait]
impl ProviderClient for HttpMonitorClient {
    async fn list_metric_catalog(
        &self,
        resource: &MonitoredResource,
    ) -> Result<Vec<ProviderMetricDescriptor>, ProviderError> {
        let url = self.endpoint("metrics")?;
        let request = self.http.get(url).query(&[(
            "dim.0",
            format!("{},{}", INSTANCE_ID_DIMENSION, resource.id),
        )]);
        let response: ListMetricsResponse = self.send(request).await?;
        Ok(response.metrics)
    }

    async fn query_metric_range(
        &self,
        resource_id: &str,
        descriptor: &ProviderMetricDescriptor,
        window: &QueryWindow,
    ) -> Result<RawMetricResponse, ProviderError> {
        let url = self.endpoint("metric-data")?;
        let request = self.http.get(url).query(&[
            ("namespace", descriptor.namespace.clone()),
            ("metric_name", descriptor.metric_name.clone()),
            ("dim.0", dimension_param(descriptor, resource_id)),
            ("from", window.start.timestamp_millis().to_string()),
            ("to", window.end.timestamp_millis().to_string()),
            ("period", window.period_secs.to_string()),
            ("filter", FILTER_AVERAGE.to_string()),
        ]);
        let mut response: RawMetricResponse = self.send(request).await?;
        if response.metric_name.is_empty() {
            response.metric_name = descriptor.metric_name.clone();
        }
        Ok(response)
    }

    async fn query_metric_range_batch(
        &self,
        targets: &[BatchTarget],
        window: &QueryWindow,
    ) -> Result<RawBatchMetricResponse, ProviderError> {
        let url = self.endpoint("batch-query-metric-data")?;
        let body = BatchQueryBody {
            metrics: targets
                .iter()
                .map(|target| BatchMetricSelector {
                    namespace: &target.descriptor.namespace,
                    metric_name: &target.descriptor.metric_name,
                    dimensions: dimensions_for(target),
                })
                .collect(),
            from: window.start.timestamp_millis(),
            to: window.end.timestamp_millis(),
            period: window.period_secs.to_string(),
            filter: FILTER_AVERAGE,
        };
        self.send(self.http.post(url).json(&body)).await
    }
}
