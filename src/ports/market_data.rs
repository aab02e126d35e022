//! Market Data Port - Dashboard REST API Interface
//!
//! Read operations against the analysis backend. Response bodies are
//! opaque JSON handed back to the caller unmodified. There is no retry
//! and no caching: failures propagate directly as `RequestError`.

use async_trait::async_trait;
use serde_json::Value;

/// Default history period for `fetch_series`.
pub const DEFAULT_PERIOD: &str = "1y";

/// A failed REST call.
///
/// `status` is `None` when no HTTP response was received or the body
/// could not be read as JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request failed ({}): {message}", status_label(.status))]
pub struct RequestError {
    /// HTTP status code, if a response arrived.
    pub status: Option<u16>,
    /// Human-readable failure description.
    pub message: String,
}

impl RequestError {
    /// Failure with an HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Failure without a response (connect, timeout, body decode).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no status".to_string(), |s| s.to_string())
}

/// REST operations exposed by the dashboard backend.
#[async_trait]
pub trait MarketDataApi: Send + Sync + 'static {
    /// `GET /api/stock/{ticker}?period={period}`
    async fn fetch_series(&self, ticker: &str, period: &str) -> Result<Value, RequestError>;

    /// `GET /api/weather/{location}`
    async fn fetch_weather(&self, location: &str) -> Result<Value, RequestError>;

    /// `POST /api/analyze` with `{ticker, location}`.
    async fn request_analysis(&self, ticker: &str, location: &str)
        -> Result<Value, RequestError>;

    /// `GET /api/health`
    async fn health(&self) -> Result<Value, RequestError>;

    /// `GET /api/predictions/{ticker}?days={days}`
    async fn fetch_predictions(&self, ticker: &str, days: u32) -> Result<Value, RequestError>;

    /// `GET /api/sentiment/{ticker}?days={days}`
    async fn fetch_sentiment(&self, ticker: &str, days: u32) -> Result<Value, RequestError>;

    /// `POST /api/sentiment?text={text}`: sentiment of free text.
    async fn analyze_sentiment(&self, text: &str) -> Result<Value, RequestError>;

    /// `GET /api/correlations/{ticker}?location={location}`
    async fn fetch_correlations(&self, ticker: &str, location: &str)
        -> Result<Value, RequestError>;
}
