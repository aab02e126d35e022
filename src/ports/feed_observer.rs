//! Feed Observer Port - Consumer Callback Interface
//!
//! The two callbacks a feed consumer registers on `open`: window updates
//! and status changes. Both are invoked from the session task only, in
//! transport order, never concurrently for the same session.

use crate::domain::{FeedStatus, WindowSnapshot};

/// Receives feed updates for one subscription.
pub trait FeedObserver: Send + Sync + 'static {
    /// A record was appended; `snapshot` is the whole window after append.
    fn on_update(&self, snapshot: WindowSnapshot);

    /// Connection status changed, or a non-fatal decode error occurred.
    fn on_status(&self, status: FeedStatus);
}

/// Adapts a pair of closures into a `FeedObserver`.
pub struct CallbackObserver<U, S> {
    on_update: U,
    on_status: S,
}

impl<U, S> CallbackObserver<U, S>
where
    U: Fn(WindowSnapshot) + Send + Sync + 'static,
    S: Fn(FeedStatus) + Send + Sync + 'static,
{
    /// Wrap the update and status callbacks.
    pub const fn new(on_update: U, on_status: S) -> Self {
        Self {
            on_update,
            on_status,
        }
    }
}

impl<U, S> FeedObserver for CallbackObserver<U, S>
where
    U: Fn(WindowSnapshot) + Send + Sync + 'static,
    S: Fn(FeedStatus) + Send + Sync + 'static,
{
    fn on_update(&self, snapshot: WindowSnapshot) {
        (self.on_update)(snapshot);
    }

    fn on_status(&self, status: FeedStatus) {
        (self.on_status)(status);
    }
}
