//! Feed Transport Port - Streaming Connection Interface
//!
//! Abstracts the wire under a feed session (WebSocket in production,
//! in-process channels in tests). The session task owns at most one
//! `TransportLink` at a time and drives it from a single `select!` loop.

use async_trait::async_trait;

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Handshake could not be completed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Error on an established link.
    #[error("transport error: {0}")]
    Io(String),

    /// Link already closed.
    #[error("transport closed")]
    Closed,
}

/// Establishes links to a feed endpoint.
#[async_trait]
pub trait FeedTransport: Send + Sync + 'static {
    /// Open a link to `url`.
    ///
    /// The future may be dropped mid-flight when the consumer closes
    /// the session; implementations must release any partial state on drop.
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportLink>, TransportError>;
}

/// One established, bidirectional link.
#[async_trait]
pub trait TransportLink: Send {
    /// Wait for the next inbound text frame.
    ///
    /// `None` means the remote closed the link cleanly. Must be
    /// cancel-safe: it is raced against commands in `select!`.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Emit one outbound text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the link, best effort.
    async fn close(&mut self);
}
