//! Feed Transport Adapters - Streaming Links
//!
//! Implementations of the `FeedTransport` port:
//! - WebSocket: production link to `ws://<host>/ws/market-data`
//! - Channel: in-process link with a scriptable remote peer

pub mod channel;
pub mod websocket;

pub use channel::{ChannelListener, ChannelTransport, PendingConnection, RemotePeer};
pub use websocket::WsTransport;
