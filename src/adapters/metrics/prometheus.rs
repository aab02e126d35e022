//! Prometheus Metrics Registry - Feed Observability
//!
//! Registers and exposes feed metrics for Grafana dashboards: records
//! ingested, decode failures, status events, window fill and the
//! timestamp of the latest record.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::domain::{FeedStatus, WindowSnapshot};

/// Centralized Prometheus metrics for the feed monitor.
///
/// All metrics follow the naming convention `feed_*`.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Records appended to the window.
    pub records_total: IntCounter,
    /// Frames discarded as undecodable.
    pub decode_errors_total: IntCounter,
    /// Status events by label.
    pub status_events_total: IntCounterVec,
    /// Current window length.
    pub window_len: IntGauge,
    /// Feed connection status (1 = open, 0 = not open).
    pub connected: IntGauge,
    /// Timestamp of the latest record.
    pub last_timestamp_ms: IntGauge,
}

impl FeedMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let records_total =
            IntCounter::new("feed_records_total", "Records appended to the feed window")?;

        let decode_errors_total = IntCounter::new(
            "feed_decode_errors_total",
            "Inbound frames discarded as undecodable",
        )?;

        let status_events_total = IntCounterVec::new(
            Opts::new("feed_status_events_total", "Feed status events by kind"),
            &["status"],
        )?;

        let window_len = IntGauge::new("feed_window_len", "Records currently in the window")?;

        let connected = IntGauge::new(
            "feed_connected",
            "Feed connection status (1=open, 0=not open)",
        )?;

        let last_timestamp_ms = IntGauge::new(
            "feed_last_timestamp_ms",
            "Timestamp of the most recent record",
        )?;

        // Register all metrics
        registry.register(Box::new(records_total.clone()))?;
        registry.register(Box::new(decode_errors_total.clone()))?;
        registry.register(Box::new(status_events_total.clone()))?;
        registry.register(Box::new(window_len.clone()))?;
        registry.register(Box::new(connected.clone()))?;
        registry.register(Box::new(last_timestamp_ms.clone()))?;

        Ok(Self {
            registry,
            records_total,
            decode_errors_total,
            status_events_total,
            window_len,
            connected,
            last_timestamp_ms,
        })
    }

    /// Account for one window update.
    pub fn record_update(&self, snapshot: &WindowSnapshot) {
        self.records_total.inc();
        self.window_len
            .set(i64::try_from(snapshot.len()).unwrap_or(i64::MAX));
        if let Some(latest) = snapshot.latest() {
            self.last_timestamp_ms.set(latest.timestamp);
        }
    }

    /// Account for one status event.
    pub fn record_status(&self, status: &FeedStatus) {
        self.status_events_total
            .with_label_values(&[status.label()])
            .inc();

        match status {
            FeedStatus::Open => self.connected.set(1),
            FeedStatus::Errored(_) | FeedStatus::Closed => {
                self.connected.set(0);
                self.window_len.set(0);
            }
            FeedStatus::DecodeError(_) => self.decode_errors_total.inc(),
        }
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// `/metrics` route.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&self);
                async move { (StatusCode::OK, metrics.encode()) }
            }),
        )
    }
}
