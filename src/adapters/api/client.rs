//! Dashboard REST Client - Direct Proxy to the Analysis Backend
//!
//! Wraps reqwest for the dashboard's REST endpoints. One round trip per
//! call: no retry, no caching, no per-call timeout override. Any
//! non-success status or transport failure surfaces as `RequestError`.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::types::AnalyzeRequest;
use crate::ports::market_data::{MarketDataApi, RequestError};

/// Configuration for the REST client.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
  /// Base URL of the API, including the `/api` prefix.
  pub base_url: String,
  /// Request timeout applied to every call.
  pub timeout: Duration,
}

impl Default for RestClientConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000/api".to_string(),
      timeout: Duration::from_secs(30),
    }
  }
}

/// HTTP client for the dashboard backend.
#[derive(Debug, Clone)]
pub struct RestClient {
  /// Underlying HTTP client.
  http: Client,
  /// Parsed base URL.
  base: Url,
}

impl RestClient {
  /// Create a new REST client.
  ///
  /// # Errors
  /// Fails if the base URL is invalid or the HTTP client cannot be built.
  pub fn new(config: &RestClientConfig) -> Result<Self> {
    let base = Url::parse(&config.base_url)
      .with_context(|| format!("Invalid API base URL: {}", config.base_url))?;
    anyhow::ensure!(
      !base.cannot_be_a_base(),
      "API base URL cannot carry a path: {}",
      config.base_url
    );

    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self { http, base })
  }

  /// Build `<base>/<segments...>` with each segment percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// Send one request and read the JSON body.
  async fn execute(&self, request: RequestBuilder, path: &str) -> Result<Value, RequestError> {
    let started = Instant::now();

    let response = request.send().await.map_err(|e| {
      warn!(path, error = %e, "Request failed");
      RequestError::transport(e.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let message = if body.trim().is_empty() {
        status
          .canonical_reason()
          .unwrap_or("request failed")
          .to_string()
      } else {
        body
      };
      warn!(path, status = status.as_u16(), "API returned error status");
      return Err(RequestError::http(status.as_u16(), message));
    }

    let value = response
      .json::<Value>()
      .await
      .map_err(|e| RequestError::transport(format!("invalid JSON body: {e}")))?;

    debug!(
      path,
      status = status.as_u16(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "Request completed"
    );

    Ok(value)
  }

  async fn get(&self, url: Url) -> Result<Value, RequestError> {
    let path = url.path().to_string();
    self.execute(self.http.get(url), &path).await
  }
}

#[async_trait]
impl MarketDataApi for RestClient {
  #[instrument(skip(self))]
  async fn fetch_series(&self, ticker: &str, period: &str) -> Result<Value, RequestError> {
    let mut url = self.endpoint(&["stock", ticker]);
    url.query_pairs_mut().append_pair("period", period);
    self.get(url).await
  }

  #[instrument(skip(self))]
  async fn fetch_weather(&self, location: &str) -> Result<Value, RequestError> {
    self.get(self.endpoint(&["weather", location])).await
  }

  #[instrument(skip(self))]
  async fn request_analysis(&self, ticker: &str, location: &str) -> Result<Value, RequestError> {
    let url = self.endpoint(&["analyze"]);
    let path = url.path().to_string();
    let body = AnalyzeRequest { ticker, location };
    self.execute(self.http.post(url).json(&body), &path).await
  }

  #[instrument(skip(self))]
  async fn health(&self) -> Result<Value, RequestError> {
    self.get(self.endpoint(&["health"])).await
  }

  #[instrument(skip(self))]
  async fn fetch_predictions(&self, ticker: &str, days: u32) -> Result<Value, RequestError> {
    let mut url = self.endpoint(&["predictions", ticker]);
    url.query_pairs_mut().append_pair("days", &days.to_string());
    self.get(url).await
  }

  #[instrument(skip(self))]
  async fn fetch_sentiment(&self, ticker: &str, days: u32) -> Result<Value, RequestError> {
    let mut url = self.endpoint(&["sentiment", ticker]);
    url.query_pairs_mut().append_pair("days", &days.to_string());
    self.get(url).await
  }

  #[instrument(skip(self, text), fields(text_len = text.len()))]
  async fn analyze_sentiment(&self, text: &str) -> Result<Value, RequestError> {
    // The backend reads `text` from the query string, not a JSON body.
    let mut url = self.endpoint(&["sentiment"]);
    url.query_pairs_mut().append_pair("text", text);
    let path = url.path().to_string();
    self.execute(self.http.post(url), &path).await
  }

  #[instrument(skip(self))]
  async fn fetch_correlations(&self, ticker: &str, location: &str) -> Result<Value, RequestError> {
    let mut url = self.endpoint(&["correlations", ticker]);
    url.query_pairs_mut().append_pair("location", location);
    self.get(url).await
  }
}
