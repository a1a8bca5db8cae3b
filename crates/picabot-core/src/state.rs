//! Connection lifecycle states.
//!
//! ```text
//!  Disconnected ──connect()──► Connecting ──open──► Authenticating ──ack──► Connected
//!                                  │  ▲                  │                     │
//!                         refused  │  │ backoff elapsed  │ reject / timeout    │ lost
//!                                  ▼  │                  ▼                     │
//!                               Reconnecting ◄───────────┼─────────────────────┘
//!                                                        ▼
//!                      (any state) ──close()────────►  Closed
//! ```

use std::fmt;

use crate::error::{AuthenticationError, ConnectError};

/// The single source of truth for "can we send/receive right now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not started yet.
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting for the server to accept the credentials.
    Authenticating,
    /// Authenticated. Frames are read and dispatched.
    Connected,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
    /// Terminal for the current run.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for `Closed`.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` while a run is in progress (neither idle nor closed).
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Authenticating => "Authenticating",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Why the machine reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called.
    Requested,
    /// Authentication failed; fatal.
    Authentication(AuthenticationError),
    /// The retry ceiling was reached.
    RetriesExhausted {
        /// Failed attempts counted before giving up.
        attempts: u32,
    },
}

impl CloseReason {
    /// Converts the reason into the error returned by `connect()`.
    pub fn into_connect_error(self) -> ConnectError {
        match self {
            Self::Requested => ConnectError::Closed,
            Self::Authentication(err) => ConnectError::Authentication(err),
            Self::RetriesExhausted { attempts } => ConnectError::RetriesExhausted { attempts },
        }
    }
}

/// A consistent view of the machine, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Current state.
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful authentication.
    pub attempt: u32,
    /// Incremented on every successful authentication.
    pub session: u64,
    /// Set when `state` is `Closed`.
    pub close_reason: Option<CloseReason>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            session: 0,
            close_reason: None,
        }
    }
}

impl StateSnapshot {
    /// Returns `true` if frames may be sent under this snapshot.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!ConnectionState::Disconnected.is_active());
        assert!(ConnectionState::Reconnecting.is_active());
        assert!(!ConnectionState::Closed.is_active());
        assert!(ConnectionState::Closed.is_closed());
    }

    #[test]
    fn test_close_reason_maps_to_connect_error() {
        assert_eq!(
            CloseReason::Requested.into_connect_error(),
            ConnectError::Closed
        );
        assert_eq!(
            CloseReason::RetriesExhausted { attempts: 3 }.into_connect_error(),
            ConnectError::RetriesExhausted { attempts: 3 }
        );
    }
}
