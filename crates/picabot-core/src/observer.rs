//! Observability hook.
//!
//! Failures that are contained locally (dropped frames, failing handlers,
//! transient transport loss) never reach the caller. They are reported here
//! instead. Every method has a default that logs through `tracing`, so an
//! implementation only overrides what it cares about.

use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::error::{HandlerError, ParseError, TransportError};
use crate::frame::InboundFrame;
use crate::state::ConnectionState;

/// Receives lifecycle notifications and contained failures.
///
/// Methods are called inline on the reader loop or a handler task and must
/// return quickly.
pub trait Observer: Send + Sync {
    /// The connection moved from one state to another.
    fn on_state_change(&self, from: ConnectionState, to: ConnectionState) {
        if to == ConnectionState::Connected || to == ConnectionState::Closed {
            info!(from = %from, to = %to, "Connection state changed");
        } else {
            debug!(from = %from, to = %to, "Connection state changed");
        }
    }

    /// The transport failed; the state machine will retry.
    fn on_transport_error(&self, error: &TransportError) {
        warn!(error = %error, "Transport error");
    }

    /// A frame was dropped because it could not be parsed.
    fn on_parse_error(&self, error: &ParseError, raw: &str) {
        warn!(error = %error, len = raw.len(), "Dropping unparseable frame");
    }

    /// A handler returned an error or panicked.
    fn on_handler_error(&self, error: &HandlerError) {
        error!(
            handler = %error.source_handler,
            panicked = error.panicked,
            reason = %error.reason,
            "Handler failed"
        );
    }

    /// A frame was parsed, before any dispatch.
    fn on_frame(&self, frame: &InboundFrame) {
        trace!(kind = frame.kind(), "Frame received");
    }
}

/// The default observer: everything goes to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {}

/// Shared observer.
pub type BoxedObserver = Arc<dyn Observer>;

/// Returns the default observer.
pub fn tracing_observer() -> BoxedObserver {
    Arc::new(TracingObserver)
}
