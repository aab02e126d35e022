//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP client, WebSockets, metrics export).
//!
//! Adapter categories:
//! - `api`: dashboard REST client
//! - `chrome`: headless window-control signal sink
//! - `feeds`: streaming feed transports (WebSocket, in-process)
//! - `metrics`: Prometheus metrics export and health checks

pub mod api;
pub mod chrome;
pub mod feeds;
pub mod metrics;
