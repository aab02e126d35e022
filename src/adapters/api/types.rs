//! Dashboard API Request Types
//!
//! Request bodies sent to the analysis backend. Responses are opaque
//! JSON and deliberately have no types here.

use serde::Serialize;

/// Body of `POST /api/analyze`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalyzeRequest<'a> {
  /// Stock ticker, e.g. "AAPL".
  pub ticker: &'a str,
  /// Weather location, e.g. "New York".
  pub location: &'a str,
}
