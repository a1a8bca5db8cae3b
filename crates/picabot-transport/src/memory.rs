//! In-process loopback transport.
//!
//! [`pair`] returns a [`MemoryConnector`] to hand to a bot and the
//! [`MemoryServer`] that plays the remote side. Each successful `open`
//! yields one [`MemoryPeer`] on the server side:
//!
//! ```rust,ignore
//! let (connector, mut server) = memory::pair();
//! // ... start a bot with `connector` ...
//! let mut peer = server.accept().await.unwrap();
//! let auth = peer.recv().await.unwrap();
//! peer.send(r#"{"t":"auth","ok":true}"#)?;
//! ```
//!
//! Dropping or closing a peer ends the client's stream with
//! [`Incoming::Closed`], which is how tests simulate a lost connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use picabot_core::{
    Connector, DuplexChannel, Endpoint, FrameSink, FrameStream, Incoming, TransportError,
    TransportResult,
};

struct Shared {
    opens: AtomicUsize,
    refuse: AtomicUsize,
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Creates a connected connector/server pair.
pub fn pair() -> (MemoryConnector, MemoryServer) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        opens: AtomicUsize::new(0),
        refuse: AtomicUsize::new(0),
        accept_tx,
    });
    (
        MemoryConnector {
            shared: Arc::clone(&shared),
        },
        MemoryServer { shared, accept_rx },
    )
}

/// Client side of the loopback transport.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("opens", &self.shared.opens.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, endpoint: &Endpoint) -> TransportResult<DuplexChannel> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .shared
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            debug!(endpoint = %endpoint, "Memory server refused connection");
            return Err(TransportError::ConnectionFailed {
                endpoint: endpoint.url(),
                reason: "refused by memory server".to_string(),
            });
        }

        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            tx: Mutex::new(Some(to_client_tx)),
            rx: to_server_rx,
        };
        self.shared
            .accept_tx
            .send(peer)
            .map_err(|_| TransportError::ConnectionFailed {
                endpoint: endpoint.url(),
                reason: "memory server is gone".to_string(),
            })?;

        Ok(DuplexChannel::new(
            MemorySink {
                tx: Some(to_server_tx),
            },
            MemoryStream { rx: to_client_rx },
        ))
    }
}

/// Server side of the loopback transport.
pub struct MemoryServer {
    shared: Arc<Shared>,
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryServer {
    /// Waits for the next successful `open`.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Returns an already opened peer without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.try_recv().ok()
    }

    /// Makes the next `n` calls to `open` fail.
    pub fn refuse_next(&self, n: usize) {
        self.shared.refuse.store(n, Ordering::SeqCst);
    }

    /// Number of `open` calls so far, refused ones included.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MemoryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryServer")
            .field("opens", &self.open_count())
            .finish()
    }
}

/// The server's view of one open channel.
pub struct MemoryPeer {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Waits for the next frame the client sent.
    ///
    /// Returns `None` once the client closed or dropped its sink.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Returns a frame the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Sends a frame to the client.
    pub fn send(&self, frame: impl Into<String>) -> TransportResult<()> {
        let tx = self.tx.lock();
        let tx = tx
            .as_ref()
            .ok_or_else(|| TransportError::SendFailed("channel closed".to_string()))?;
        tx.send(frame.into())
            .map_err(|_| TransportError::SendFailed("client is gone".to_string()))
    }

    /// Closes the channel from the server side.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    /// Returns `true` once either side closed the channel.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().as_ref().is_none_or(|tx| tx.is_closed())
    }
}

impl std::fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPeer").finish_non_exhaustive()
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, payload: String) -> TransportResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TransportError::SendFailed("channel closed".to_string()))?;
        tx.send(payload)
            .map_err(|_| TransportError::SendFailed("peer is gone".to_string()))
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn receive_next(&mut self) -> TransportResult<Incoming> {
        Ok(match self.rx.recv().await {
            Some(frame) => Incoming::Frame(frame),
            None => Incoming::Closed,
        })
    }
}
