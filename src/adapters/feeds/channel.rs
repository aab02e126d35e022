//! In-Process Feed Transport - Channel-Backed Links
//!
//! A `FeedTransport` whose "remote" side lives in the same process.
//! Each `connect` is surfaced to a `ChannelListener` as a
//! `PendingConnection` that can be accepted or rejected. Accepting
//! yields a `RemotePeer` that pushes frames, errors and closes into
//! the link and observes what the client sent.
//!
//! Used to embed a feed producer without a socket and to drive
//! `FeedConnection` deterministically in tests.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::ports::feed_transport::{FeedTransport, TransportError, TransportLink};

type Inbound = Result<String, TransportError>;

/// Client side: hands out links when the listener accepts.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    pending_tx: mpsc::UnboundedSender<PendingConnection>,
}

/// Server side: receives connection attempts.
#[derive(Debug)]
pub struct ChannelListener {
    pending_rx: mpsc::UnboundedReceiver<PendingConnection>,
}

impl ChannelTransport {
    /// Create a connected transport/listener pair.
    pub fn pair() -> (Self, ChannelListener) {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        (Self { pending_tx }, ChannelListener { pending_rx })
    }
}

impl ChannelListener {
    /// Wait for the next connection attempt.
    pub async fn next_connection(&mut self) -> Option<PendingConnection> {
        self.pending_rx.recv().await
    }
}

/// A connect call waiting for the listener's decision.
#[derive(Debug)]
pub struct PendingConnection {
    url: String,
    reply: oneshot::Sender<Result<ChannelLink, TransportError>>,
}

impl PendingConnection {
    /// URL the client asked for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Complete the handshake.
    ///
    /// If the client abandoned the attempt meanwhile, the link is dropped
    /// immediately and the returned peer observes it as released.
    pub fn accept(self) -> RemotePeer {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let link = ChannelLink {
            inbound: inbound_rx,
            outbound: Some(outbound_tx),
        };
        // Err means the connect future was dropped; the link goes with it.
        let _ = self.reply.send(Ok(link));

        RemotePeer {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
        }
    }

    /// Fail the handshake with `reason`.
    pub fn reject(self, reason: impl Into<String>) {
        let _ = self
            .reply
            .send(Err(TransportError::Connect(reason.into())));
    }
}

#[async_trait]
impl FeedTransport for ChannelTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportLink>, TransportError> {
        let (reply, decision) = oneshot::channel();
        self.pending_tx
            .send(PendingConnection {
                url: url.to_string(),
                reply,
            })
            .map_err(|_| TransportError::Connect("listener gone".to_string()))?;

        let link = decision
            .await
            .map_err(|_| TransportError::Connect("listener dropped the attempt".to_string()))??;
        Ok(Box::new(link))
    }
}

/// Client end of an accepted connection.
#[derive(Debug)]
struct ChannelLink {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl TransportLink for ChannelLink {
    async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(text)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.outbound = None;
        self.inbound.close();
    }
}

/// Remote end of an accepted connection.
#[derive(Debug)]
pub struct RemotePeer {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl RemotePeer {
    /// Deliver a text frame. Returns `false` once the client released the link.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.push(Ok(text.into()))
    }

    /// Deliver a transport error.
    pub fn push_error(&self, message: impl Into<String>) -> bool {
        self.push(Err(TransportError::Io(message.into())))
    }

    /// Close from the remote side; the client sees a clean end of stream
    /// after any frames already pushed.
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Next frame the client sent, `None` once the client released the link.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Whether the client released its end of the link.
    pub fn is_released(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Frame already sent by the client, without waiting.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    fn push(&self, frame: Inbound) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }
}
