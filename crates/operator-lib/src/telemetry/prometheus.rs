//! Prometheus HTTP API client

use super::{InstantSample, RangeSeries, Telemetry};
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiData {
    result_type: String,
    result: Vec<ApiSeries>,
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
    #[serde(default)]
    metric: HashMap<String, String>,
    #[serde(default)]
    value: Option<(f64, String)>,
    #[serde(default)]
    values: Option<Vec<(f64, String)>>,
}

fn parse_value(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| OperatorError::Telemetry(format!("bad sample value {:?}: {}", raw, e)))
}

/// Client for `/api/v1/query` and `/api/v1/query_range`
#[derive(Clone)]
pub struct PrometheusClient {
    client: Client,
    base_url: Url,
}

impl PrometheusClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| OperatorError::Telemetry(format!("failed to build HTTP client: {}", e)))?;

        let mut base_url = Url::parse(base_url)
            .map_err(|e| OperatorError::Config(format!("invalid Prometheus URL: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<ApiData> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| OperatorError::Config(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| OperatorError::Telemetry(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| OperatorError::Telemetry(format!("HTTP {}: {}", status, e)))?;

        if body.status != "success" {
            return Err(OperatorError::Telemetry(format!(
                "query failed: {}",
                body.error.unwrap_or_else(|| body.status.clone())
            )));
        }

        body.data
            .ok_or_else(|| OperatorError::Telemetry("response without data".to_string()))
    }
}

#[async_trait]
impl Telemetry for PrometheusClient {
    async fn query_instant(&self, expr: &str) -> Result<Vec<InstantSample>> {
        let data = self
            .get("api/v1/query", &[("query", expr.to_string())])
            .await?;

        if data.result_type != "vector" {
            return Err(OperatorError::Telemetry(format!(
                "expected vector result, got {}",
                data.result_type
            )));
        }

        data.result
            .into_iter()
            .filter_map(|series| series.value.map(|v| (series.metric, v)))
            .map(|(labels, (timestamp, raw))| {
                Ok(InstantSample {
                    labels,
                    timestamp,
                    value: parse_value(&raw)?,
                })
            })
            .collect()
    }

    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<RangeSeries>> {
        let params = [
            ("query", expr.to_string()),
            ("start", start.timestamp().to_string()),
            ("end", end.timestamp().to_string()),
            ("step", step.as_secs().max(1).to_string()),
        ];
        let data = self.get("api/v1/query_range", &params).await?;

        if data.result_type != "matrix" {
            return Err(OperatorError::Telemetry(format!(
                "expected matrix result, got {}",
                data.result_type
            )));
        }

        data.result
            .into_iter()
            .map(|series| {
                let mut points = series
                    .values
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(ts, raw)| Ok((ts, parse_value(&raw)?)))
                    .collect::<Result<Vec<_>>>()?;
                points.sort_by(|a, b| a.0.total_cmp(&b.0));
                Ok(RangeSeries {
                    labels: series.metric,
                    points,
                })
            })
            .collect()
    }
}
