//! Window Chrome Port - Host Window Control Signals
//!
//! The UI layer receives this capability set explicitly instead of
//! reaching for a global host binding. Signals are fire-and-forget:
//! no return value, no error channel.

use std::fmt;

/// One window-control signal sent from the UI to the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromeSignal {
    /// Minimize the window.
    Minimize,
    /// Toggle maximized/unmaximized.
    ToggleMaximize,
    /// Close the window.
    Close,
}

impl fmt::Display for ChromeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Minimize => "minimize",
            Self::ToggleMaximize => "toggle-maximize",
            Self::Close => "close",
        })
    }
}

/// Capability set `{minimize, maximize, close}` injected into the UI layer.
pub trait WindowChrome: Send + Sync {
    /// Deliver one signal to the host.
    fn signal(&self, signal: ChromeSignal);

    /// Minimize the window.
    fn minimize(&self) {
        self.signal(ChromeSignal::Minimize);
    }

    /// Toggle maximized state.
    fn toggle_maximize(&self) {
        self.signal(ChromeSignal::ToggleMaximize);
    }

    /// Close the window.
    fn close(&self) {
        self.signal(ChromeSignal::Close);
    }
}
