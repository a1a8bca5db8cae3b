//! The transport boundary.
//!
//! The connection core never touches sockets, TLS or frame encoding. It asks
//! a [`Connector`] for a [`DuplexChannel`] and then moves text frames through
//! the channel's two halves.
//!
//! ```text
//! Connector::open(endpoint) ──► DuplexChannel { sink, stream }
//!                                   │             │
//!                     FrameSink::send/close   FrameStream::receive_next
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::credentials::Endpoint;
use crate::error::TransportResult;

/// One result of [`FrameStream::receive_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text frame.
    Frame(String),
    /// The peer closed the channel cleanly.
    Closed,
}

/// The write half of an open channel.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one text frame.
    async fn send(&mut self, payload: String) -> TransportResult<()>;

    /// Closes the channel. Errors are swallowed; the channel is gone either way.
    async fn close(&mut self);
}

/// The read half of an open channel.
#[async_trait]
pub trait FrameStream: Send {
    /// Waits for the next frame.
    ///
    /// Must be cancel-safe: dropping the returned future before it completes
    /// must not lose a frame. The state machine races this against outbound
    /// sends and close requests.
    async fn receive_next(&mut self) -> TransportResult<Incoming>;
}

/// An open duplex channel, split into its halves.
pub struct DuplexChannel {
    /// Write half.
    pub sink: Box<dyn FrameSink>,
    /// Read half.
    pub stream: Box<dyn FrameStream>,
}

impl DuplexChannel {
    /// Assembles a channel from its halves.
    pub fn new(sink: impl FrameSink + 'static, stream: impl FrameStream + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            stream: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for DuplexChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexChannel").finish_non_exhaustive()
    }
}

/// Opens channels to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Short name used in logs (e.g. `"websocket"`).
    fn name(&self) -> &'static str;

    /// Opens a new channel. A refusal is a transient [`TransportError`](crate::TransportError).
    async fn open(&self, endpoint: &Endpoint) -> TransportResult<DuplexChannel>;
}

/// Shared connector.
pub type BoxedConnector = Arc<dyn Connector>;
