//! Integration Tests - Feed Connection Lifecycle
//!
//! Drives `FeedConnection` end to end over the in-process channel
//! transport: the test plays the remote feed through `RemotePeer` and
//! records every observer callback. Transport failures on connect and
//! window chrome defaults are covered with mockall mocks.

use std::sync::Arc;
use std::time::Duration;

use mockall::mock;
use mockall::predicate::*;
use serde_json::json;
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;

use weather_market_feed::adapters::feeds::{
    ChannelListener, ChannelTransport, PendingConnection, RemotePeer,
};
use weather_market_feed::domain::{ConnectionState, FeedStatus, WindowSnapshot};
use weather_market_feed::ports::feed_observer::FeedObserver;
use weather_market_feed::ports::feed_transport::{FeedTransport, TransportError, TransportLink};
use weather_market_feed::ports::window_chrome::{ChromeSignal, WindowChrome};
use weather_market_feed::usecases::{FeedConnection, FeedHandle, FeedSettings};

const FEED_URL: &str = "ws://feed.test/ws/market-data";

// ---- Recording observer ----

#[derive(Debug, Clone)]
enum Seen {
    Update(WindowSnapshot),
    Status(FeedStatus),
}

struct Recorder {
    tx: mpsc::UnboundedSender<Seen>,
}

impl FeedObserver for Recorder {
    fn on_update(&self, snapshot: WindowSnapshot) {
        let _ = self.tx.send(Seen::Update(snapshot));
    }

    fn on_status(&self, status: FeedStatus) {
        let _ = self.tx.send(Seen::Status(status));
    }
}

fn recorder() -> (Arc<dyn FeedObserver>, mpsc::UnboundedReceiver<Seen>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { tx }), rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a feed event")
        .expect("observer dropped")
}

async fn next_status(rx: &mut mpsc::UnboundedReceiver<Seen>) -> FeedStatus {
    match next_event(rx).await {
        Seen::Status(status) => status,
        other => panic!("expected a status event, got {other:?}"),
    }
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<Seen>) -> WindowSnapshot {
    match next_event(rx).await {
        Seen::Update(snapshot) => snapshot,
        other => panic!("expected an update event, got {other:?}"),
    }
}

/// Give the session task time to run, then assert nothing was delivered.
async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Seen>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Ok(event) = rx.try_recv() {
        panic!("unexpected feed event: {event:?}");
    }
}

async fn wait_released(peer: &mut RemotePeer) {
    let drained = timeout(Duration::from_secs(2), async {
        while peer.next_sent().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "client never released the link");
}

fn frame(t: i64, price: f64) -> String {
    json!({ "t": t, "price": price, "temperature": 20.5 }).to_string()
}

struct Harness {
    feed: FeedConnection<ChannelTransport>,
    listener: ChannelListener,
}

impl Harness {
    fn new(capacity: usize) -> Self {
        let (transport, listener) = ChannelTransport::pair();
        let feed = FeedConnection::new(
            Arc::new(transport),
            FeedSettings {
                window_capacity: capacity,
                ..FeedSettings::default()
            },
        );
        Self { feed, listener }
    }

    /// Open and accept; returns once `Open` was observed.
    async fn connected(&mut self) -> (FeedHandle, RemotePeer, mpsc::UnboundedReceiver<Seen>) {
        let (observer, mut rx) = recorder();
        let handle = self.feed.open(FEED_URL, observer);
        let pending = self.next_connection().await;
        assert_eq!(pending.url(), FEED_URL);
        let peer = pending.accept();
        assert_eq!(next_status(&mut rx).await, FeedStatus::Open);
        (handle, peer, rx)
    }

    async fn next_connection(&mut self) -> PendingConnection {
        timeout(Duration::from_secs(2), self.listener.next_connection())
            .await
            .expect("timed out waiting for a connect")
            .expect("transport dropped")
    }
}

// ---- Lifecycle ----

#[tokio::test]
async fn test_open_then_updates_in_order() {
    let mut h = Harness::new(50);
    let (handle, peer, mut rx) = h.connected().await;
    assert_eq!(handle.state(), ConnectionState::Open);
    assert!(handle.is_connected());
    assert_eq!(handle.generation(), 1);

    assert!(peer.push_text(frame(1, 100.0)));
    assert!(peer.push_text(frame(2, 101.5)));

    let first = next_update(&mut rx).await;
    assert_eq!(first.timestamps(), vec![1]);
    let second = next_update(&mut rx).await;
    assert_eq!(second.timestamps(), vec![1, 2]);
    assert_eq!(second.latest().and_then(|r| r.field("price")), Some(101.5));

    // Earlier snapshots are not affected by later appends.
    assert_eq!(first.len(), 1);
}

#[tokio::test]
async fn test_window_keeps_last_fifty_of_sixty() {
    let mut h = Harness::new(50);
    let (_handle, peer, mut rx) = h.connected().await;

    for t in 1..=60 {
        assert!(peer.push_text(frame(t, t as f64)));
    }

    let mut last = WindowSnapshot::empty();
    for _ in 1..=60 {
        last = next_update(&mut rx).await;
    }

    assert_eq!(last.len(), 50);
    assert_eq!(last.timestamps(), (11..=60).collect::<Vec<_>>());
    assert_eq!(last[0].field("price"), Some(11.0));
}

#[tokio::test]
async fn test_out_of_order_records_kept_in_arrival_order() {
    let mut h = Harness::new(50);
    let (_handle, peer, mut rx) = h.connected().await;

    peer.push_text(frame(5, 1.0));
    peer.push_text(frame(3, 2.0));

    next_update(&mut rx).await;
    let snapshot = next_update(&mut rx).await;
    assert_eq!(snapshot.timestamps(), vec![5, 3]);
}

// ---- Close ----

#[tokio::test]
async fn test_close_before_connect_completes() {
    let mut h = Harness::new(50);
    let (observer, mut rx) = recorder();
    let handle = h.feed.open(FEED_URL, observer);

    let pending = h.next_connection().await;
    h.feed.close(&handle);
    assert_eq!(handle.state(), ConnectionState::Closed);

    // The handshake finishes after close: no Open, link released.
    let mut peer = pending.accept();
    peer.push_text(frame(1, 1.0));

    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
    assert_quiet(&mut rx).await;
    wait_released(&mut peer).await;
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut h = Harness::new(50);
    let (handle, mut peer, mut rx) = h.connected().await;

    h.feed.close(&handle);
    h.feed.close(&handle);
    handle.close();

    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
    assert_quiet(&mut rx).await;
    assert_eq!(handle.state(), ConnectionState::Closed);
    wait_released(&mut peer).await;
}

#[tokio::test]
async fn test_frames_after_close_are_not_delivered() {
    let mut h = Harness::new(50);
    let (handle, peer, mut rx) = h.connected().await;

    handle.close();
    peer.push_text(frame(1, 1.0));

    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_remote_close() {
    let mut h = Harness::new(50);
    let (mut handle, mut peer, mut rx) = h.connected().await;

    peer.push_text(frame(1, 1.0));
    peer.close();

    assert_eq!(next_update(&mut rx).await.len(), 1);
    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
    let state = handle
        .wait_for_state(|s| *s == ConnectionState::Closed)
        .await;
    assert_eq!(state, ConnectionState::Closed);

    // Already closed: the consumer's close is silent.
    handle.close();
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_wait_for_state_returns_last_state_when_session_ends() {
    let mut h = Harness::new(50);
    let (mut handle, mut peer, mut rx) = h.connected().await;

    peer.close();
    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);

    // The session task is gone; an unreachable state yields the final one.
    let state = timeout(
        Duration::from_secs(2),
        handle.wait_for_state(|s| *s == ConnectionState::Connecting),
    )
    .await
    .expect("wait_for_state hung after the session ended");
    assert_eq!(state, ConnectionState::Closed);
}

#[tokio::test]
async fn test_dropping_handle_releases_link() {
    let mut h = Harness::new(50);
    let (handle, mut peer, mut rx) = h.connected().await;

    drop(handle);

    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
    wait_released(&mut peer).await;
}

// ---- Errors ----

#[tokio::test]
async fn test_decode_error_keeps_state_and_window() {
    let mut h = Harness::new(50);
    let (handle, peer, mut rx) = h.connected().await;

    peer.push_text(frame(1, 1.0));
    assert_eq!(next_update(&mut rx).await.timestamps(), vec![1]);

    peer.push_text("not json at all");
    match next_status(&mut rx).await {
        FeedStatus::DecodeError(message) => assert!(message.contains("malformed JSON")),
        other => panic!("expected a decode error, got {other:?}"),
    }
    assert_eq!(handle.state(), ConnectionState::Open);

    peer.push_text(r#"{"t": 2, "label": "no numbers"}"#);
    assert!(matches!(
        next_status(&mut rx).await,
        FeedStatus::DecodeError(_)
    ));

    peer.push_text(frame(3, 3.0));
    assert_eq!(next_update(&mut rx).await.timestamps(), vec![1, 3]);
}

#[tokio::test]
async fn test_transport_error_is_terminal_without_reconnect() {
    let mut h = Harness::new(50);
    let (mut handle, peer, mut rx) = h.connected().await;

    peer.push_error("connection reset");
    assert_eq!(
        next_status(&mut rx).await,
        FeedStatus::Errored("transport error: connection reset".to_string())
    );
    let state = handle
        .wait_for_state(|s| *s == ConnectionState::Errored)
        .await;
    assert_eq!(state, ConnectionState::Errored);

    // No reconnect attempt reaches the listener.
    let reconnect = timeout(Duration::from_millis(100), h.listener.next_connection()).await;
    assert!(reconnect.is_err(), "core must not reconnect on its own");

    assert!(!handle.send(&json!({ "subscribe": "AAPL" })));

    handle.close();
    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_rejected_connect_reports_errored() {
    let mut h = Harness::new(50);
    let (observer, mut rx) = recorder();
    let mut handle = h.feed.open(FEED_URL, observer);

    h.next_connection().await.reject("refused");

    assert_eq!(
        next_status(&mut rx).await,
        FeedStatus::Errored("connection failed: refused".to_string())
    );
    let state = handle
        .wait_for_state(|s| *s == ConnectionState::Errored)
        .await;
    assert_eq!(state, ConnectionState::Errored);
}

// ---- Send ----

#[tokio::test]
async fn test_send_while_connecting_is_dropped() {
    let mut h = Harness::new(50);
    let (observer, mut rx) = recorder();
    let handle = h.feed.open(FEED_URL, observer);

    let pending = h.next_connection().await;
    assert_eq!(handle.state(), ConnectionState::Connecting);
    assert!(!handle.send(&json!({ "early": true })));
    assert!(!h.feed.send(&handle, &json!({ "early": true })));

    let mut peer = pending.accept();
    assert_eq!(next_status(&mut rx).await, FeedStatus::Open);

    // Nothing was queued for later.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(peer.try_next_sent(), None);

    assert!(h.feed.send(&handle, &json!({ "subscribe": "AAPL" })));
    let sent = timeout(Duration::from_secs(2), peer.next_sent())
        .await
        .expect("timed out waiting for the outbound frame");
    assert_eq!(sent.as_deref(), Some(r#"{"subscribe":"AAPL"}"#));
}

#[tokio::test]
async fn test_send_after_close_is_dropped() {
    let mut h = Harness::new(50);
    let (handle, _peer, _rx) = h.connected().await;

    handle.close();
    assert!(!handle.send_text("ping"));
}

// ---- Re-open ----

#[tokio::test]
async fn test_reopen_releases_previous_link_first() {
    let mut h = Harness::new(50);
    let (first, first_peer, mut first_rx) = h.connected().await;

    let (observer, mut second_rx) = recorder();
    let second = h.feed.open(FEED_URL, observer);
    assert_eq!(second.generation(), first.generation() + 1);
    assert_eq!(h.feed.generation(), 2);
    assert_eq!(first.state(), ConnectionState::Closed);

    let pending = h.next_connection().await;
    assert!(
        first_peer.is_released(),
        "previous link must be released before the next connect"
    );
    assert_eq!(next_status(&mut first_rx).await, FeedStatus::Closed);

    // The superseded peer can no longer reach any observer.
    assert!(!first_peer.push_text(frame(1, 1.0)));

    let second_peer = pending.accept();
    assert_eq!(next_status(&mut second_rx).await, FeedStatus::Open);
    second_peer.push_text(frame(7, 7.0));
    assert_eq!(next_update(&mut second_rx).await.timestamps(), vec![7]);

    assert_quiet(&mut first_rx).await;
}

#[tokio::test]
async fn test_reopen_after_close_waits_for_release() {
    let mut h = Harness::new(50);
    let (first, first_peer, mut first_rx) = h.connected().await;

    h.feed.close(&first);
    let (observer, mut second_rx) = recorder();
    let _second = h.feed.open(FEED_URL, observer);

    let pending = h.next_connection().await;
    assert!(first_peer.is_released());
    assert_eq!(next_status(&mut first_rx).await, FeedStatus::Closed);

    let _peer = pending.accept();
    assert_eq!(next_status(&mut second_rx).await, FeedStatus::Open);
}

// ---- Mocked transport ----

mock! {
    pub Transport {}

    #[async_trait::async_trait]
    impl FeedTransport for Transport {
        async fn connect(&self, url: &str) -> Result<Box<dyn TransportLink>, TransportError>;
    }
}

#[tokio::test]
async fn test_connect_failure_is_reported_once() {
    let mut transport = MockTransport::new();
    transport
        .expect_connect()
        .with(eq(FEED_URL))
        .times(1)
        .returning(|_| Err(TransportError::Connect("dns failure".to_string())));

    let mut feed = FeedConnection::new(Arc::new(transport), FeedSettings::default());
    let (observer, mut rx) = recorder();
    let handle = feed.open(FEED_URL, observer);

    assert_eq!(
        next_status(&mut rx).await,
        FeedStatus::Errored("connection failed: dns failure".to_string())
    );
    assert_quiet(&mut rx).await;

    feed.close(&handle);
    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
}

// ---- Window chrome ----

mock! {
    pub Chrome {}

    impl WindowChrome for Chrome {
        fn signal(&self, signal: ChromeSignal);
    }
}

#[test]
fn test_chrome_default_methods_signal() {
    let mut chrome = MockChrome::new();
    chrome
        .expect_signal()
        .with(eq(ChromeSignal::Minimize))
        .times(1)
        .return_const(());
    chrome
        .expect_signal()
        .with(eq(ChromeSignal::ToggleMaximize))
        .times(1)
        .return_const(());
    chrome
        .expect_signal()
        .with(eq(ChromeSignal::Close))
        .times(1)
        .return_const(());

    chrome.minimize();
    chrome.toggle_maximize();
    chrome.close();
}

// ---- Timestamp labels ----

#[tokio::test]
async fn test_date_and_free_form_labels_reach_window() {
    let mut h = Harness::new(50);
    let (_handle, peer, mut rx) = h.connected().await;

    peer.push_text(r#"{"timestamp": "2024-01-01", "price": 150.5}"#);
    peer.push_text(r#"{"timestamp": "10:30:00", "price": 151.0}"#);
    peer.push_text(r#"{"timestamp": 1700000000.25, "price": 152.0}"#);

    next_update(&mut rx).await;
    next_update(&mut rx).await;
    let snapshot = next_update(&mut rx).await;
    assert_eq!(
        snapshot.labels(),
        vec!["2024-01-01", "10:30:00", "1700000000.25"]
    );
    assert_eq!(snapshot[0].timestamp, 1_704_067_200_000);
    assert_eq!(snapshot[2].timestamp, 1_700_000_000_250);
}

// ---- Graceful close ----

#[tokio::test]
async fn test_close_gracefully_waits_for_release() {
    let mut h = Harness::new(50);
    let (mut handle, peer, mut rx) = h.connected().await;

    assert!(handle.close_gracefully(Duration::from_secs(2)).await);
    // Closed was reached only after the link went away.
    assert!(peer.is_released());
    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
}

#[tokio::test]
async fn test_close_gracefully_after_error() {
    let mut h = Harness::new(50);
    let (mut handle, peer, mut rx) = h.connected().await;

    peer.push_error("reset");
    assert!(matches!(next_status(&mut rx).await, FeedStatus::Errored(_)));

    assert!(handle.close_gracefully(Duration::from_secs(2)).await);
    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
}

// ---- Outbound backpressure ----

/// Transport whose links accept one outbound frame and then never finish
/// sending it.
struct StalledTransport {
    send_started: Arc<Notify>,
}

struct StalledLink {
    send_started: Arc<Notify>,
}

#[async_trait::async_trait]
impl FeedTransport for StalledTransport {
    async fn connect(&self, _url: &str) -> Result<Box<dyn TransportLink>, TransportError> {
        Ok(Box::new(StalledLink {
            send_started: Arc::clone(&self.send_started),
        }))
    }
}

#[async_trait::async_trait]
impl TransportLink for StalledLink {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        std::future::pending().await
    }

    async fn send_text(&mut self, _text: String) -> Result<(), TransportError> {
        self.send_started.notify_one();
        std::future::pending().await
    }

    async fn close(&mut self) {}
}

#[tokio::test]
async fn test_full_outbound_queue_drops_frames() {
    let send_started = Arc::new(Notify::new());
    let transport = StalledTransport {
        send_started: Arc::clone(&send_started),
    };
    let mut feed = FeedConnection::new(
        Arc::new(transport),
        FeedSettings {
            outbound_capacity: 2,
            ..FeedSettings::default()
        },
    );
    let (observer, mut rx) = recorder();
    let handle = feed.open(FEED_URL, observer);
    assert_eq!(next_status(&mut rx).await, FeedStatus::Open);

    // The first frame is taken by the session and stalls in the transport.
    assert!(handle.send_text("first"));
    timeout(Duration::from_secs(2), send_started.notified())
        .await
        .expect("session never started sending");

    assert!(handle.send_text("second"));
    assert!(handle.send_text("third"));
    assert!(!handle.send_text("overflow"));

    // A stalled send does not hold off close.
    handle.close();
    assert_eq!(next_status(&mut rx).await, FeedStatus::Closed);
}
