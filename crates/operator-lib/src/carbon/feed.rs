//! Carbon intensity feeds
//!
//! `ElectricityMapsFeed` reads the last 24 hours of grid carbon intensity
//! for a zone; `StaticProfile` serves a fixed daily profile.

use super::{CarbonIntensitySource, REFERENCE_PROFILE};
use crate::error::{OperatorError, Result};
use crate::models::{HourlyValue, HOURS_PER_DAY};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default public endpoint of the Electricity Maps API
pub const DEFAULT_ELECTRICITY_MAPS_URL: &str = "https://api.electricitymap.org";

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    datetime: DateTime<Utc>,
    carbon_intensity: Option<f64>,
}

/// Carbon intensity history from Electricity Maps
pub struct ElectricityMapsFeed {
    client: Client,
    base_url: Url,
    zone: String,
    auth_token: String,
}

impl ElectricityMapsFeed {
    pub fn new(base_url: &str, zone: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OperatorError::CarbonFeed(format!("failed to build HTTP client: {}", e)))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| OperatorError::Config(format!("invalid carbon feed URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            zone: zone.into(),
            auth_token: auth_token.into(),
        })
    }

    fn history_url(&self) -> Result<Url> {
        let mut url = self
            .base_url
            .join("v3/carbon-intensity/history")
            .map_err(|e| OperatorError::Config(e.to_string()))?;
        url.query_pairs_mut().append_pair("zone", &self.zone);
        Ok(url)
    }
}

#[async_trait]
impl CarbonIntensitySource for ElectricityMapsFeed {
    async fn hourly_intensity(&self) -> Result<Vec<HourlyValue>> {
        let url = self.history_url()?;
        let response = self
            .client
            .get(url)
            .header("auth-token", &self.auth_token)
            .send()
            .await
            .map_err(|e| OperatorError::CarbonFeed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OperatorError::CarbonFeed(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let body: HistoryResponse = response
            .json()
            .await
            .map_err(|e| OperatorError::CarbonFeed(format!("failed to parse history: {}", e)))?;

        let samples: Vec<HourlyValue> = body
            .history
            .into_iter()
            .filter_map(|entry| {
                entry
                    .carbon_intensity
                    .map(|value| HourlyValue::new(entry.datetime.hour(), value))
            })
            .collect();

        debug!(zone = %self.zone, samples = samples.len(), "Fetched carbon intensity history");
        Ok(samples)
    }

    fn name(&self) -> &str {
        "electricity-maps"
    }
}

/// Fixed daily carbon intensity profile
#[derive(Debug, Clone)]
pub struct StaticProfile {
    values: Vec<f64>,
}

impl StaticProfile {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.len() != HOURS_PER_DAY {
            return Err(OperatorError::Config(format!(
                "static carbon profile needs {} values, got {}",
                HOURS_PER_DAY,
                values.len()
            )));
        }
        Ok(Self { values })
    }
}

impl Default for StaticProfile {
    fn default() -> Self {
        Self {
            values: REFERENCE_PROFILE.to_vec(),
        }
    }
}

#[async_trait]
impl CarbonIntensitySource for StaticProfile {
    async fn hourly_intensity(&self) -> Result<Vec<HourlyValue>> {
        Ok(self
            .values
            .iter()
            .enumerate()
            .map(|(hour, value)| HourlyValue::new(hour as u32, *value))
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_electricity_maps_history_parsing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/carbon-intensity/history")
            .match_query(Matcher::UrlEncoded("zone".into(), "SK".into()))
            .match_header("auth-token", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "zone": "SK",
                    "history": [
                        {"zone": "SK", "datetime": "2026-10-16T22:00:00.000Z", "carbonIntensity": 228},
                        {"zone": "SK", "datetime": "2026-10-16T23:00:00.000Z", "carbonIntensity": null},
                        {"zone": "SK", "datetime": "2026-10-17T00:00:00.000Z", "carbonIntensity": 244}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let feed = ElectricityMapsFeed::new(&server.url(), "SK", "secret").unwrap();
        let samples = feed.hourly_intensity().await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            samples,
            vec![HourlyValue::new(22, 228.0), HourlyValue::new(0, 244.0)]
        );
    }

    #[tokio::test]
    async fn test_electricity_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/carbon-intensity/history")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let feed = ElectricityMapsFeed::new(&server.url(), "SK", "bad").unwrap();
        let err = feed.hourly_intensity().await.unwrap_err();
        assert!(matches!(err, OperatorError::CarbonFeed(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_static_profile_covers_every_hour() {
        let samples = StaticProfile::default().hourly_intensity().await.unwrap();
        assert_eq!(samples.len(), 24);
        assert_eq!(samples[7], HourlyValue::new(7, 140.0));
    }

    #[test]
    fn test_static_profile_requires_full_day() {
        assert!(StaticProfile::new(vec![1.0; 23]).is_err());
        assert!(StaticProfile::new(vec![1.0; 24]).is_ok());
    }
}
