//! Feed Monitor - Entry Point
//!
//! Headless consumer of the real-time market/weather feed. Runs until
//! SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from the first CLI argument) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Spawn health + metrics server (/live, /ready, /metrics)
//! 4. Check the dashboard REST API (/api/health)
//! 5. Open the feed (FeedConnection over WebSocket)
//! 6. Event loop: record updates/status into metrics, re-open on
//!    error/close when `feed.reopen_delay_secs` > 0
//! 7. SIGINT → close feed (bounded wait) → signal window close → stop servers

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use weather_market_feed::adapters::api::RestClient;
use weather_market_feed::adapters::chrome::HeadlessChrome;
use weather_market_feed::adapters::feeds::WsTransport;
use weather_market_feed::adapters::metrics::{FeedMetrics, HealthServer, HealthState};
use weather_market_feed::config;
use weather_market_feed::domain::{FeedStatus, WindowSnapshot};
use weather_market_feed::ports::feed_observer::{CallbackObserver, FeedObserver};
use weather_market_feed::ports::market_data::MarketDataApi;
use weather_market_feed::ports::window_chrome::WindowChrome;
use weather_market_feed::usecases::{FeedConnection, FeedHandle};

/// Time allowed for the feed session to release its socket on shutdown.
const FEED_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Feed callbacks forwarded into the main loop, tagged with the open
/// attempt that produced them.
enum MonitorEvent {
    Update(u64, WindowSnapshot),
    Status(u64, FeedStatus),
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        feed = %config.feed.url,
        window_capacity = config.feed.window_capacity,
        "Starting feed monitor"
    );

    // ── 3. Health + metrics server ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let metrics = Arc::new(FeedMetrics::new().context("Failed to register metrics")?);
    let health = Arc::new(HealthState::new());

    let server_handle = if config.metrics.enabled {
        let server = HealthServer::new(Arc::clone(&health), config.metrics.bind_address.clone())
            .with_routes(Arc::clone(&metrics).router());
        let server_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 4. Check the REST backend ───────────────────────────
    let api = RestClient::new(&config.api.client_config())
        .context("Failed to create REST client")?;
    match api.health().await {
        Ok(body) => info!(%body, "Dashboard API reachable"),
        Err(e) => warn!(error = %e, "Dashboard API health check failed"),
    }

    // ── 5. Open the feed ────────────────────────────────────
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<MonitorEvent>();
    let mut feed = FeedConnection::new(Arc::new(WsTransport::new()), config.feed.settings());
    let mut attempt: u64 = 1;
    let mut handle = feed.open(&config.feed.url, observer_for(attempt, &event_tx));

    let reopen_delay = config.feed.reopen_delay();
    let mut reopen_at: Option<Instant> = None;

    // ── 6. Event loop ───────────────────────────────────────
    loop {
        tokio::select! {
            biased;
            _ = signal::ctrl_c() => {
                info!("SIGINT received, initiating graceful shutdown");
                break;
            }
            Some(event) = event_rx.recv() => match event {
                MonitorEvent::Update(from, snapshot) if from == attempt => {
                    metrics.record_update(&snapshot);
                    log_update(&snapshot);
                }
                MonitorEvent::Status(from, status) if from == attempt => {
                    metrics.record_status(&status);
                    match &status {
                        FeedStatus::Open => {
                            health.set_feed_open(true);
                            reopen_at = None;
                            info!(attempt, "Feed open");
                        }
                        FeedStatus::DecodeError(message) => {
                            warn!(error = %message, "Feed frame discarded");
                        }
                        FeedStatus::Errored(_) | FeedStatus::Closed => {
                            health.set_feed_open(false);
                            warn!(
                                attempt,
                                status = status.label(),
                                error = status.message().unwrap_or_default(),
                                "Feed down"
                            );
                            if let Some(delay) = reopen_delay {
                                info!(delay_secs = delay.as_secs(), "Feed re-open scheduled");
                                reopen_at = Some(Instant::now() + delay);
                            }
                        }
                    }
                }
                MonitorEvent::Update(..) | MonitorEvent::Status(..) => {
                    debug!("Event from a superseded feed attempt ignored");
                }
            },
            () = sleep_until(reopen_at.unwrap_or_else(Instant::now)), if reopen_at.is_some() => {
                reopen_at = None;
                attempt += 1;
                info!(attempt, "Re-opening feed");
                handle = feed.open(&config.feed.url, observer_for(attempt, &event_tx));
            }
        }
    }

    // ── 7. Graceful shutdown ────────────────────────────────
    let chrome = HeadlessChrome::new(config.app.name.clone());
    shutdown(&chrome, &mut handle, &shutdown_tx).await;

    if let Some(server) = server_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Observer forwarding callbacks of one open attempt into the main loop.
fn observer_for(
    attempt: u64,
    tx: &mpsc::UnboundedSender<MonitorEvent>,
) -> Arc<dyn FeedObserver> {
    let update_tx = tx.clone();
    let status_tx = tx.clone();
    Arc::new(CallbackObserver::new(
        move |snapshot: WindowSnapshot| {
            let _ = update_tx.send(MonitorEvent::Update(attempt, snapshot));
        },
        move |status: FeedStatus| {
            let _ = status_tx.send(MonitorEvent::Status(attempt, status));
        },
    ))
}

fn log_update(snapshot: &WindowSnapshot) {
    if let Some(latest) = snapshot.latest() {
        debug!(
            window_len = snapshot.len(),
            timestamp = latest.timestamp,
            label = %latest.label,
            fields = ?latest.fields,
            "Feed update"
        );
    }
}

/// Release the feed, tell the host window to close, stop servers.
///
/// Waits for the session to send its close frame so the runtime does not
/// cancel it mid-teardown.
async fn shutdown(
    chrome: &dyn WindowChrome,
    handle: &mut FeedHandle,
    shutdown_tx: &broadcast::Sender<()>,
) {
    if !handle.close_gracefully(FEED_CLOSE_GRACE).await {
        warn!(
            grace_ms = FEED_CLOSE_GRACE.as_millis() as u64,
            "Feed did not close within grace period"
        );
    }
    chrome.close();
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");
}
