//! WebSocket Feed Transport - Production Link to the Streaming Feed
//!
//! Implements `FeedTransport` over tokio-tungstenite. Frames are handed
//! to the session as text; binary frames are decoded as (lossy) UTF-8
//! and ping/pong frames never reach the session. Pong replies are
//! handled automatically by tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, instrument};

use crate::ports::feed_transport::{FeedTransport, TransportError, TransportLink};

/// Connects to `ws://` / `wss://` feed endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Create a new WebSocket transport.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    #[instrument(skip(self))]
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportLink>, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WsLink { stream }))
    }
}

/// One established WebSocket connection.
struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportLink for WsLink {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()));
                }
                Ok(Message::Ping(data)) => {
                    debug!(len = data.len(), "Feed ping received");
                }
                Ok(Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Feed close frame received");
                    return None;
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}
