//! Domain layer - Feed records, the bounded record window and the
//! connection lifecycle.
//!
//! No I/O here (hexagonal architecture inner ring). Everything is
//! testable in isolation.

pub mod record;
pub mod state;
pub mod window;

// Re-export core types for convenience
pub use record::{FeedError, FeedRecord};
pub use state::{ConnectionState, FeedStatus};
pub use window::{DEFAULT_WINDOW_CAPACITY, RecordWindow, WindowSnapshot};
