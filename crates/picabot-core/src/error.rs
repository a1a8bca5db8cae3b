//! Unified error types for picabot.
//!
//! Every failure the connection core can produce has exactly one home here.
//! The variants are grouped by how they propagate:
//!
//! - [`TransportError`] is transient: the state machine reconnects.
//! - [`AuthenticationError`] is fatal for the current run.
//! - [`ParseError`] and [`HandlerError`] are contained per frame / per handler.
//! - [`RegistrationError`] and [`SendError`] are returned synchronously to the caller.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by a transport adapter.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport refused to open.
    #[error("connection failed: {endpoint} - {reason}")]
    ConnectionFailed {
        /// The endpoint that failed to open (never contains credentials).
        endpoint: String,
        /// Reason for failure.
        reason: String,
    },

    /// The remote side closed the connection.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Writing a frame failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// Reading a frame failed.
    #[error("failed to receive frame: {0}")]
    ReceiveFailed(String),

    /// An operation did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being waited on.
        operation: &'static str,
        /// The configured limit.
        after: Duration,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl TransportError {
    /// Creates a connection-closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Parse Errors
// =============================================================================

/// A single inbound frame could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The payload is not valid JSON.
    #[error("invalid JSON: {reason}")]
    InvalidJson {
        /// Reason reported by the JSON parser.
        reason: String,
    },

    /// The payload is JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// A required field is absent or has the wrong type.
    #[error("missing or invalid field '{field}'")]
    MissingField {
        /// Dotted path of the field.
        field: String,
    },
}

impl ParseError {
    /// Creates a missing-field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson {
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Authentication / Connect Errors
// =============================================================================

/// Authentication failed. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// The server rejected the credentials.
    #[error("authentication rejected: {reason}")]
    Rejected {
        /// Reason given by the server, if any.
        reason: String,
    },

    /// No acknowledgement arrived in time.
    #[error("authentication timed out after {0:?}")]
    Timeout(Duration),
}

/// Terminal outcome of `connect()` when the machine ends up `Closed` instead
/// of `Connected`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Credentials were rejected or never acknowledged.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// The configured reconnection ceiling was reached.
    #[error("gave up after {attempts} reconnection attempts")]
    RetriesExhausted {
        /// Number of failed attempts.
        attempts: u32,
    },

    /// `close()` was requested before the connection was established.
    #[error("connection closed by request")]
    Closed,
}

// =============================================================================
// Usage-time Errors
// =============================================================================

/// Errors returned by `send_message`.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The connection is not in the `Connected` state. Nothing was sent.
    #[error("not connected")]
    NotConnected,

    /// The transport failed while writing the frame.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors returned when registering a command handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A handler is already bound to this command name.
    #[error("command '{name}' is already registered")]
    DuplicateCommand {
        /// The duplicated command name.
        name: String,
    },

    /// The command name is empty or contains whitespace.
    #[error("invalid command name '{name}'")]
    InvalidCommandName {
        /// The rejected name.
        name: String,
    },
}

// =============================================================================
// Handler Errors
// =============================================================================

/// Identifies which handler a [`HandlerError`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerSource {
    /// The handler bound to a command name.
    Command(String),
    /// The `index`-th handler registered for an event name.
    Event {
        /// Event name.
        name: String,
        /// Position in the registration order.
        index: usize,
    },
}

impl fmt::Display for HandlerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(name) => write!(f, "command '{name}'"),
            Self::Event { name, index } => write!(f, "event '{name}' handler #{index}"),
        }
    }
}

/// A user handler returned an error or panicked.
#[derive(Debug, Clone, Error)]
#[error("{source_handler} failed: {reason}")]
pub struct HandlerError {
    /// Which handler failed.
    pub source_handler: HandlerSource,
    /// Rendered error or panic payload.
    pub reason: String,
    /// Whether the handler panicked rather than returning an error.
    pub panicked: bool,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for frame parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for `send_message`.
pub type SendResult<T> = Result<T, SendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display_names_source() {
        let err = HandlerError {
            source_handler: HandlerSource::Event {
                name: "message".into(),
                index: 1,
            },
            reason: "boom".into(),
            panicked: false,
        };
        assert_eq!(err.to_string(), "event 'message' handler #1 failed: boom");
    }

    #[test]
    fn test_connect_error_wraps_authentication() {
        let err: ConnectError = AuthenticationError::Rejected {
            reason: "bad token".into(),
        }
        .into();
        assert!(matches!(err, ConnectError::Authentication(_)));
        assert_eq!(err.to_string(), "authentication rejected: bad token");
    }
}
