//! Health Check Server - Liveness and Readiness Checks
//!
//! Exposes /live and /ready endpoints via axum 0.7, plus whatever extra
//! routes (metrics) the caller merges in. Readiness follows the feed:
//! ready only while the subscription is `Open`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Shared health state polled by readiness checks.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Whether the feed is currently open.
    pub feed_open: AtomicBool,
}

impl HealthState {
    /// Create a new health state (not ready until the feed opens).
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the feed's open/closed status.
    pub fn set_feed_open(&self, open: bool) {
        self.feed_open.store(open, Ordering::Relaxed);
    }

    /// Check if the monitor is ready to serve.
    pub fn is_ready(&self) -> bool {
        self.feed_open.load(Ordering::Relaxed)
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Health state shared with the feed consumer.
    state: Arc<HealthState>,
    /// Bind address, e.g. "0.0.0.0:9090".
    bind_address: String,
    /// Additional routes served alongside the health checks.
    extra: Router,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(state: Arc<HealthState>, bind_address: impl Into<String>) -> Self {
        Self {
            state,
            bind_address: bind_address.into(),
            extra: Router::new(),
        }
    }

    /// Serve `routes` on the same listener.
    #[must_use]
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.extra = self.extra.merge(routes);
        self
    }

    /// Health routes merged with the extra routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(Arc::clone(&self.state))
            .merge(self.extra.clone())
    }

    /// Run the server until the shutdown signal.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness check: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness check: returns 200 only while the feed is open.
    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}
