//! Feed Connection - Lifecycle of One Streaming Subscription
//!
//! `open` spawns a session task that owns the transport link, the
//! `RecordWindow` and the state channel. It is the single writer: every
//! window mutation and every observer callback happens on that task, in
//! the order the transport produced the events.
//!
//! Outbound frames travel through a small bounded queue into the
//! session's `select!` loop; a full queue drops the frame. Close requests
//! bypass that queue through the session fence. Late events are fenced
//! two ways:
//! - each `open` bumps a shared generation counter; a session whose
//!   generation is no longer current stops delivering,
//! - `close` sets the session's `closed` flag synchronously, before the
//!   session task is woken.
//!
//! The core never reconnects. Errors are reported once and the session
//! stays terminal until the consumer closes it or opens again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    ConnectionState, DEFAULT_WINDOW_CAPACITY, FeedRecord, FeedStatus, RecordWindow,
};
use crate::ports::feed_observer::FeedObserver;
use crate::ports::feed_transport::{FeedTransport, TransportLink};

/// Default number of outbound frames waiting for the transport.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Tunables for a feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    /// Records kept in the window before the oldest is evicted.
    pub window_capacity: usize,
    /// Outbound frames buffered while the transport is busy. Frames sent
    /// beyond this are dropped.
    pub outbound_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// Liveness fence shared by a handle and its session task.
#[derive(Debug)]
struct SessionFence {
    generation: u64,
    current: Arc<AtomicU64>,
    closed: AtomicBool,
    /// Woken once by the first close request.
    close_requested: Notify,
}

impl SessionFence {
    /// Whether non-terminal events may still reach the observer.
    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
            && self.current.load(Ordering::Acquire) == self.generation
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Set the closed flag; `true` only for the first caller.
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

impl SessionFence {
    fn new(generation: u64, current: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            current,
            closed: AtomicBool::new(false),
            close_requested: Notify::new(),
        }
    }
}

/// Close a session from outside: fence first, then wake the task.
///
/// `notify_one` stores a permit when the task is not waiting yet, so the
/// request is never lost.
fn request_close(fence: &SessionFence) {
    if fence.mark_closed() {
        fence.close_requested.notify_one();
    }
}

/// Handle to one opened subscription.
///
/// Dropping the handle closes the subscription.
#[derive(Debug)]
pub struct FeedHandle {
    fence: Arc<SessionFence>,
    outbound: mpsc::Sender<String>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl FeedHandle {
    /// Generation id of the `open` call that produced this handle.
    pub fn generation(&self) -> u64 {
        self.fence.generation
    }

    /// Current connection state. `Closed` as soon as `close` was called.
    pub fn state(&self) -> ConnectionState {
        if self.fence.is_closed() {
            ConnectionState::Closed
        } else {
            *self.state_rx.borrow()
        }
    }

    /// Whether the feed is `Open`.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Release the subscription. Idempotent.
    pub fn close(&self) {
        request_close(&self.fence);
    }

    /// Close and wait up to `grace` for the session to release its
    /// transport. Returns whether `Closed` was reached in time.
    pub async fn close_gracefully(&mut self, grace: Duration) -> bool {
        self.close();
        let closed = tokio::time::timeout(
            grace,
            self.wait_for_state(|s| *s == ConnectionState::Closed),
        )
        .await;
        matches!(closed, Ok(ConnectionState::Closed))
    }

    /// Best-effort emit of a raw text frame.
    ///
    /// Dropped without error when the connection is not `Open` or the
    /// outbound queue is full; nothing is kept for a later state. Returns
    /// whether the frame was handed to the session task.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if !self.is_connected() {
            debug!(
                generation = self.fence.generation,
                state = %self.state(),
                "Feed not open, outbound frame dropped"
            );
            return false;
        }
        match self.outbound.try_send(text.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    generation = self.fence.generation,
                    capacity = self.outbound.max_capacity(),
                    "Outbound queue full, frame dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Best-effort emit of a JSON payload. See `send_text`.
    pub fn send<P: Serialize + ?Sized>(&self, payload: &P) -> bool {
        if !self.is_connected() {
            debug!(
                generation = self.fence.generation,
                "Feed not open, outbound payload dropped"
            );
            return false;
        }
        match serde_json::to_string(payload) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!(error = %e, "Outbound payload not serializable, dropped");
                false
            }
        }
    }

    /// Wait until the session state satisfies `predicate`.
    ///
    /// Returns the matching state, or the last known state if the session
    /// task has finished without ever matching.
    pub async fn wait_for_state<F>(&mut self, predicate: F) -> ConnectionState
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let matched = self.state_rx.wait_for(predicate).await.map(|state| *state);
        matched.unwrap_or_else(|_| *self.state_rx.borrow())
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// The currently active session of a `FeedConnection`.
struct ActiveSession {
    fence: Arc<SessionFence>,
    task: JoinHandle<()>,
}

/// Owns one logical feed subscription at a time.
///
/// Re-opening releases the previous session's transport before the new
/// one connects, so at most one link is ever held.
pub struct FeedConnection<T: FeedTransport> {
    transport: Arc<T>,
    settings: FeedSettings,
    current: Arc<AtomicU64>,
    active: Option<ActiveSession>,
}

impl<T: FeedTransport> FeedConnection<T> {
    /// Create an idle connection.
    ///
    /// # Panics
    /// Panics if `settings.window_capacity` or `settings.outbound_capacity`
    /// is zero.
    pub fn new(transport: Arc<T>, settings: FeedSettings) -> Self {
        assert!(
            settings.window_capacity > 0,
            "record window capacity must be positive"
        );
        assert!(
            settings.outbound_capacity > 0,
            "outbound queue capacity must be positive"
        );
        Self {
            transport,
            settings,
            current: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    /// Generation of the most recent `open` (0 before the first).
    pub fn generation(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Start an asynchronous connection attempt to `url`.
    ///
    /// Returns immediately; the outcome reaches `observer.on_status`.
    /// Any previous session is closed first.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn open(&mut self, url: &str, observer: Arc<dyn FeedObserver>) -> FeedHandle {
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;

        let previous = self.active.take().map(|session| {
            request_close(&session.fence);
            session.task
        });

        let fence = Arc::new(SessionFence::new(generation, Arc::clone(&self.current)));
        let (outbound_tx, outbound_rx) = mpsc::channel(self.settings.outbound_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let session = FeedSession {
            url: url.to_string(),
            generation,
            fence: Arc::clone(&fence),
            transport: Arc::clone(&self.transport),
            observer,
            window: RecordWindow::new(self.settings.window_capacity),
            state_tx,
            outbound: outbound_rx,
            last_timestamp: None,
        };

        let task = tokio::spawn(session.run(previous));

        self.active = Some(ActiveSession {
            fence: Arc::clone(&fence),
            task,
        });

        FeedHandle {
            fence,
            outbound: outbound_tx,
            state_rx,
        }
    }

    /// Release the subscription behind `handle`. Idempotent; stale
    /// handles are accepted.
    ///
    /// The session slot is kept so a later `open` still waits for this
    /// session to drop its link.
    pub fn close(&self, handle: &FeedHandle) {
        handle.close();
    }

    /// Best-effort emit through `handle`. See `FeedHandle::send`.
    pub fn send<P: Serialize + ?Sized>(&self, handle: &FeedHandle, payload: &P) -> bool {
        handle.send(payload)
    }
}

impl<T: FeedTransport> Drop for FeedConnection<T> {
    fn drop(&mut self) {
        if let Some(session) = self.active.take() {
            request_close(&session.fence);
        }
    }
}

/// State owned by one session task.
struct FeedSession<T: FeedTransport> {
    url: String,
    generation: u64,
    fence: Arc<SessionFence>,
    transport: Arc<T>,
    observer: Arc<dyn FeedObserver>,
    window: RecordWindow,
    state_tx: watch::Sender<ConnectionState>,
    outbound: mpsc::Receiver<String>,
    last_timestamp: Option<i64>,
}

impl<T: FeedTransport> FeedSession<T> {
    #[instrument(skip_all, fields(url = %self.url, generation = self.generation))]
    async fn run(mut self, previous: Option<JoinHandle<()>>) {
        if let Some(previous) = previous {
            // The previous session must drop its link before we connect.
            let _ = previous.await;
        }

        if !self.fence.is_live() {
            self.await_close().await;
            return;
        }

        self.transition(ConnectionState::Connecting);
        debug!("Feed connecting");

        let transport = Arc::clone(&self.transport);
        let fence = Arc::clone(&self.fence);
        let url = self.url.clone();

        let outcome = tokio::select! {
            biased;
            () = fence.close_requested.notified() => {
                debug!("Close requested during connect, attempt abandoned");
                self.finish_close();
                return;
            }
            result = transport.connect(&url) => result,
        };

        let link = match outcome {
            Ok(link) => link,
            Err(e) => {
                self.fail(e.to_string());
                self.await_close().await;
                return;
            }
        };

        if !self.fence.is_live() {
            debug!("Connect completed after close, releasing link");
            let mut link = link;
            link.close().await;
            self.await_close().await;
            return;
        }

        if self.transition(ConnectionState::Open) {
            info!("Feed connected");
            self.notify(FeedStatus::Open);
        }

        self.stream(link).await;
    }

    /// Pump frames until the link ends or close is requested.
    async fn stream(&mut self, mut link: Box<dyn TransportLink>) {
        let fence = Arc::clone(&self.fence);
        loop {
            tokio::select! {
                biased;
                () = fence.close_requested.notified() => {
                    self.release(link).await;
                    return;
                }
                Some(text) = self.outbound.recv() => {
                    let open = *self.state_tx.borrow() == ConnectionState::Open;
                    if !open {
                        debug!("Outbound frame dropped, feed not open");
                        continue;
                    }
                    // A stalled transport must not hold off a close.
                    let interrupted = tokio::select! {
                        biased;
                        () = fence.close_requested.notified() => true,
                        sent = link.send_text(text) => {
                            if let Err(e) = sent {
                                warn!(error = %e, "Outbound frame failed");
                            }
                            false
                        }
                    };
                    if interrupted {
                        self.release(link).await;
                        return;
                    }
                }
                frame = link.recv() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => {
                        drop(link);
                        self.fail(e.to_string());
                        self.await_close().await;
                        return;
                    }
                    None => {
                        info!("Feed closed by remote");
                        drop(link);
                        self.finish_close();
                        return;
                    }
                },
            }
        }
    }

    /// Decode one frame and publish the new window.
    fn handle_frame(&mut self, text: &str) {
        if !self.fence.is_live() {
            return;
        }

        match FeedRecord::decode(text) {
            Ok(record) => {
                if let Some(last) = self.last_timestamp {
                    if record.timestamp < last {
                        debug!(
                            timestamp = record.timestamp,
                            previous = last,
                            "Out-of-order record kept in arrival order"
                        );
                    }
                }
                self.last_timestamp = Some(record.timestamp);
                self.window.push(record);
                self.observer.on_update(self.window.snapshot());
            }
            Err(e) => {
                debug!(error = %e, "Discarding undecodable feed frame");
                self.observer.on_status(FeedStatus::DecodeError(e.to_string()));
            }
        }
    }

    /// Consumer-requested close of an open link.
    async fn release(&mut self, mut link: Box<dyn TransportLink>) {
        self.transition(ConnectionState::Closing);
        link.close().await;
        drop(link);
        self.finish_close();
    }

    /// Hold a terminal session until the consumer closes it.
    async fn await_close(&mut self) {
        let fence = Arc::clone(&self.fence);
        fence.close_requested.notified().await;
        self.finish_close();
    }

    fn fail(&mut self, message: String) {
        if self.transition(ConnectionState::Errored) {
            warn!(error = %message, "Feed errored");
            self.notify(FeedStatus::Errored(message));
        }
    }

    /// Clear buffers and reach `Closed`, notifying at most once.
    ///
    /// `Closed` is terminal and delivered even after the fence closed.
    fn finish_close(&mut self) {
        self.window.clear();
        self.last_timestamp = None;
        if self.transition(ConnectionState::Closed) {
            debug!("Feed session closed");
            self.observer.on_status(FeedStatus::Closed);
        }
    }

    /// Non-terminal notification, suppressed once fenced.
    fn notify(&self, status: FeedStatus) {
        if self.fence.is_live() {
            self.observer.on_status(status);
        }
    }

    fn transition(&self, next: ConnectionState) -> bool {
        let current = *self.state_tx.borrow();
        if !current.can_transition_to(next) {
            debug!(from = %current, to = %next, "Ignoring illegal feed state transition");
            return false;
        }
        self.state_tx.send_replace(next);
        true
    }
}
