//! Use Cases Layer - Application Logic
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `FeedConnection`: one streaming subscription, its lifecycle and
//!   bounded record window

pub mod feed_connection;

pub use feed_connection::{DEFAULT_OUTBOUND_CAPACITY, FeedConnection, FeedHandle, FeedSettings};
