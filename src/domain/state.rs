//! Connection Lifecycle - States and Status Events
//!
//! `Idle → Connecting → Open → Closing → Closed`, with `Errored`
//! reachable from `Connecting` or `Open`. Every transition the feed
//! session performs is checked against `can_transition_to`.

use std::fmt;

/// Lifecycle of one feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, no connection attempt yet.
    Idle,
    /// Transport handshake in flight.
    Connecting,
    /// Transport established, frames flowing.
    Open,
    /// Local close requested, transport being released.
    Closing,
    /// Terminal: released locally or closed by the remote.
    Closed,
    /// Terminal until the consumer opens again.
    Errored,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Closed, Closing, Connecting, Errored, Idle, Open};
        matches!(
            (self, next),
            (Idle, Connecting | Closed)
                | (Connecting, Open | Errored | Closing | Closed)
                | (Open, Closing | Closed | Errored)
                | (Closing | Errored, Closed)
        )
    }

    /// `Closed` and `Errored` accept no further transport events.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Label used for logs and metric labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status notification delivered to a feed observer.
///
/// Error payloads are human-readable strings meant for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Transport established.
    Open,
    /// Connect failed or the transport errored mid-stream.
    Errored(String),
    /// Transport released (locally or by the remote).
    Closed,
    /// One inbound frame could not be decoded; connection unaffected.
    DecodeError(String),
}

impl FeedStatus {
    /// Connection state this status reports, `None` for non-transition events.
    pub const fn state(&self) -> Option<ConnectionState> {
        match self {
            Self::Open => Some(ConnectionState::Open),
            Self::Errored(_) => Some(ConnectionState::Errored),
            Self::Closed => Some(ConnectionState::Closed),
            Self::DecodeError(_) => None,
        }
    }

    /// Attached error text, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Errored(msg) | Self::DecodeError(msg) => Some(msg),
            Self::Open | Self::Closed => None,
        }
    }

    /// Label used for metric labels.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Errored(_) => "errored",
            Self::Closed => "closed",
            Self::DecodeError(_) => "decode_error",
        }
    }
}
