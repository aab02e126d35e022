//! Headless Window Chrome - Logs Window-Control Signals
//!
//! `WindowChrome` implementation for hosts without a native window
//! (the feed monitor binary). Signals are fire-and-forget, so logging
//! them is all there is to do.

use tracing::info;

use crate::ports::window_chrome::{ChromeSignal, WindowChrome};

/// Records window-control signals in the structured log.
#[derive(Debug, Clone, Default)]
pub struct HeadlessChrome {
    /// Window label included in every log line.
    window: String,
}

impl HeadlessChrome {
    /// Chrome for the window named `window`.
    pub fn new(window: impl Into<String>) -> Self {
        Self {
            window: window.into(),
        }
    }
}

impl WindowChrome for HeadlessChrome {
    fn signal(&self, signal: ChromeSignal) {
        info!(window = %self.window, %signal, "Window chrome signal");
    }
}
