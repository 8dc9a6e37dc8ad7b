//! HTTP client for the comparables backend.
//!
//! Wraps the three routes this tool needs: the health check, the
//! comparable acreage prices lookup, and the distance lookup.

use crate::models::{
    ComparablesRequest, ComparablesResponse, DistanceRequest, DistanceResponse, HealthResponse,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const HEALTH_PATH: &str = "/_healthz";
const ACRES_PRICES_PATH: &str = "/routes/scrape/acres-prices";
const DISTANCE_PATH: &str = "/routes/distance-to-city";

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Bearer token for authenticated routes.
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
            token: None,
        }
    }
}

/// Client for the comparables backend.
pub struct ApiClient {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Create a new client.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Build the absolute URL for a route.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check backend health.
    pub async fn check_health(&self) -> Result<HealthResponse> {
        let url = self.url(HEALTH_PATH);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.describe_error(e))?;

        Self::parse_response(response).await
    }

    /// Fetch comparable sales for a locality and acreage bracket.
    pub async fn get_acres_prices(
        &self,
        request: &ComparablesRequest,
    ) -> Result<ComparablesResponse> {
        info!(
            "Fetching comparables for {} {} (~{} acres)",
            request.city, request.zip_code, request.acres
        );
        let response: ComparablesResponse = self.post_json(ACRES_PRICES_PATH, request).await?;
        info!("Received {} comparables", response.prices.len());
        Ok(response)
    }

    /// Fetch driving distance and duration between two places.
    pub async fn get_distance_to_city(&self, request: &DistanceRequest) -> Result<DistanceResponse> {
        info!(
            "Fetching distance from {} to {}",
            request.origins, request.destination
        );
        self.post_json(DISTANCE_PATH, request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);

        let mut builder = self.http_client.post(&url).json(body);
        if let Some(ref token) = self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| self.describe_error(e))?;

        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Backend API error {}: {}", status, body));
        }

        response
            .json()
            .await
            .context("Failed to parse backend response")
    }

    fn describe_error(&self, e: reqwest::Error) -> anyhow::Error {
        if e.is_timeout() {
            anyhow::anyhow!("Request timed out after {}s", self.config.timeout_seconds)
        } else if e.is_connect() {
            anyhow::anyhow!("Cannot connect to backend at {}", self.config.base_url)
        } else {
            anyhow::anyhow!("Failed to send request: {}", e)
        }
    }
}
