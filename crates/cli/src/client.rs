//! API client for the operator's decision log endpoints

use anyhow::{Context, Result};
use operator_lib::{DailyWindowSet, PlacementEvent, ScalingEvent};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

/// API client for the energy operator
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        // keep any path prefix when joining relative paths
        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn windows(&self, date: Option<&str>) -> Result<DailyWindowSet> {
        let query: Vec<(&str, String)> = date.map(|d| ("date", d.to_string())).into_iter().collect();
        self.get("api/v1/windows", &query).await
    }

    pub async fn events(&self, limit: usize) -> Result<Vec<ScalingEvent>> {
        self.get("api/v1/events", &[("limit", limit.to_string())]).await
    }

    pub async fn placements(&self, limit: usize) -> Result<Vec<PlacementEvent>> {
        self.get("api/v1/placements", &[("limit", limit.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_windows_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/windows")
            .match_query(mockito::Matcher::UrlEncoded(
                "date".into(),
                "2026-10-17".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"date":"2026-10-17","windows":[{"start":6,"end":9,"avgIntensity":160.0,"length":4}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let set = client.windows(Some("2026-10-17")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(set.windows.len(), 1);
        assert_eq!(set.windows[0].start, 6);
    }

    #[tokio::test]
    async fn test_events_keeps_path_prefix() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/operator/api/v1/events")
            .match_query(mockito::Matcher::UrlEncoded("limit".into(), "5".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":2,"timestamp":"2026-10-17T05:00:00Z","hour":5,"deployment":"kafka-task-runner","namespace":"testing","targetReplicas":-1,"reason":"Skipped scale-down due to queue size (50 messages)"}]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/operator", server.url())).unwrap();
        let events = client.events(5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(events[0].id, 2);
        assert!(events[0].decision.is_hold());
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/windows")
            .with_status(404)
            .with_body(r#"{"error":"no windows stored for 2026-10-17"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.windows(None).await.unwrap_err();

        assert!(err.to_string().contains("404"));
    }
}
