//! WebSocket client connector.
//!
//! Opens a `ws://` or `wss://` connection and splits it into a sink and a
//! stream. Ping/pong handling stays inside this adapter; the state machine
//! only ever sees text frames and close signals.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};

use picabot_core::{
    Connector, DuplexChannel, Endpoint, FrameSink, FrameStream, Incoming, TransportError,
    TransportResult,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Connector that speaks WebSocket via `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a new WebSocket connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn open(&self, endpoint: &Endpoint) -> TransportResult<DuplexChannel> {
        let url = endpoint.url();
        info!(url = %url, "Connecting to WebSocket server");

        let (ws_stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;
        let (ws_tx, ws_rx) = ws_stream.split();

        debug!(url = %url, "WebSocket connection established");

        Ok(DuplexChannel::new(
            WsFrameSink { inner: ws_tx },
            WsFrameStream { inner: ws_rx },
        ))
    }
}

struct WsFrameSink {
    inner: WsSink,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&mut self, payload: String) -> TransportResult<()> {
        self.inner
            .send(WsMessage::Text(payload.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

struct WsFrameStream {
    inner: WsSource,
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn receive_next(&mut self) -> TransportResult<Incoming> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    trace!(len = text.len(), "Received text");
                    return Ok(Incoming::Frame(text.as_str().to_owned()));
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    trace!(len = data.len(), "Received binary");
                    return Ok(Incoming::Frame(String::from_utf8_lossy(&data).into_owned()));
                }
                // tungstenite queues the pong itself.
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {
                    trace!("Received ping/pong");
                }
                Some(Ok(WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(frame = ?frame, "Server closed connection");
                    return Ok(Incoming::Closed);
                }
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                None => {
                    info!("WebSocket stream ended");
                    return Ok(Incoming::Closed);
                }
            }
        }
    }
}
