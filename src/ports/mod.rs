//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `FeedTransport`: streaming connection under a feed session
//! - `FeedObserver`: consumer callbacks for window updates and status
//! - `MarketDataApi`: dashboard REST backend
//! - `WindowChrome`: host window-control signals

pub mod feed_observer;
pub mod feed_transport;
pub mod market_data;
pub mod window_chrome;
