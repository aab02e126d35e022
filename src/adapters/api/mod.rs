//! Dashboard REST API Adapter
//!
//! Implements the `MarketDataApi` port against the analysis backend
//! (`/api/stock`, `/api/weather`, `/api/analyze`, ...).
//!
//! Sub-modules:
//! - `client`: reqwest-based client, one round trip per call
//! - `types`: request body definitions

pub mod client;
pub mod types;

pub use client::{RestClient, RestClientConfig};
