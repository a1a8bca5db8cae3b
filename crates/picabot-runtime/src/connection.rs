//! The connection state machine.
//!
//! A [`Connection`] owns the lifecycle of one bot: it spawns a driver task
//! per run, publishes every transition on a `watch` channel and is the only
//! writer of that channel. Everything else (the facade, [`MessageSender`]s)
//! reads consistent [`StateSnapshot`]s.
//!
//! The driver loop:
//!
//! ```text
//! loop {
//!     Connecting      open the transport (bounded by connect_timeout)
//!     Authenticating  send credentials, wait for ack (bounded by auth_timeout)
//!     Connected       select { close, outbound send, next frame }
//!     Reconnecting    sleep(backoff), unless the retry ceiling is reached
//! }
//! ```
//!
//! Every suspension point also waits on the run's cancellation token, so
//! `close()` ends the run without waiting out a timeout or a backoff delay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use picabot_core::{
    AuthenticationError, BoxedConnector, BoxedObserver, CloseReason, ConnectError,
    ConnectionState, Credentials, DuplexChannel, Endpoint, FrameSink, InboundFrame, Incoming,
    Message, OutboundFrame, SendError, SendResult, StateSnapshot, TransportError, parse_frame,
};
use picabot_framework::Dispatcher;

use crate::backoff::{Backoff, BackoffPolicy};

/// Capacity of the outbound request queue.
const OUTBOUND_CAPACITY: usize = 64;

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Where to connect.
    pub endpoint: Endpoint,
    /// Who to authenticate as.
    pub credentials: Credentials,
    /// Reconnection backoff.
    pub backoff: BackoffPolicy,
    /// Reconnection ceiling. `None` retries forever.
    pub max_retries: Option<u32>,
    /// How long to wait for the authentication result.
    pub auth_timeout: Duration,
    /// How long opening the transport may take.
    pub connect_timeout: Duration,
    /// Display name of the bot, used for self-message filtering.
    pub bot_name: String,
    /// Skip chat messages sent by `bot_name`.
    pub ignore_self: bool,
}

impl ConnectionSettings {
    /// Settings with defaults for everything but the credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            endpoint: Endpoint::default(),
            bot_name: credentials.username().to_string(),
            credentials,
            backoff: BackoffPolicy::default(),
            max_retries: None,
            auth_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            ignore_self: true,
        }
    }
}

/// A send request queued for the driver.
struct OutboundRequest {
    frame: OutboundFrame,
    /// Session the request was accepted under.
    session: u64,
    reply: oneshot::Sender<SendResult<()>>,
}

/// Handles into the current run.
struct RunHandle {
    cancel: CancellationToken,
    outbound_tx: mpsc::Sender<OutboundRequest>,
}

type RunSlot = Arc<Mutex<Option<RunHandle>>>;

/// Owner of the connection lifecycle.
pub struct Connection {
    settings: Arc<ConnectionSettings>,
    connector: BoxedConnector,
    dispatcher: Arc<Dispatcher>,
    observer: BoxedObserver,
    state_tx: Arc<watch::Sender<StateSnapshot>>,
    slot: RunSlot,
    sessions: Arc<AtomicU64>,
}

impl Connection {
    /// Creates an idle (`Disconnected`) connection.
    pub fn new(
        settings: ConnectionSettings,
        connector: BoxedConnector,
        dispatcher: Arc<Dispatcher>,
        observer: BoxedObserver,
    ) -> Self {
        let (state_tx, _) = watch::channel(StateSnapshot::default());
        Self {
            settings: Arc::new(settings),
            connector,
            dispatcher,
            observer,
            state_tx: Arc::new(state_tx),
            slot: Arc::new(Mutex::new(None)),
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The settings this connection runs with.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// A consistent snapshot of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.state_tx.borrow().clone()
    }

    /// The current state.
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().state
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.state_tx.subscribe()
    }

    /// A cloneable handle for sending chat messages.
    pub fn sender(&self) -> MessageSender {
        MessageSender {
            state_rx: self.state_tx.subscribe(),
            slot: Arc::clone(&self.slot),
        }
    }

    /// Starts a run unless one is active, then waits until it is `Connected`
    /// or `Closed`.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let mut state_rx = self.state_tx.subscribe();
        self.start();

        loop {
            let snapshot = state_rx.borrow_and_update().clone();
            match snapshot.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Closed => {
                    return Err(snapshot
                        .close_reason
                        .map_or(ConnectError::Closed, CloseReason::into_connect_error));
                }
                _ => {}
            }
            if state_rx.changed().await.is_err() {
                return Err(ConnectError::Closed);
            }
        }
    }

    /// Waits until the current run is `Closed` and returns why.
    ///
    /// Returns immediately with `None` if no run was ever started.
    pub async fn closed(&self) -> Option<CloseReason> {
        let mut state_rx = self.state_tx.subscribe();
        loop {
            let snapshot = state_rx.borrow_and_update().clone();
            match snapshot.state {
                ConnectionState::Closed => return snapshot.close_reason,
                ConnectionState::Disconnected => return None,
                _ => {}
            }
            if state_rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Asks the current run to stop without waiting for it.
    ///
    /// Safe to call from any state and from inside handlers.
    pub fn request_close(&self) {
        let slot = self.slot.lock();
        match self.state() {
            ConnectionState::Closed => {}
            ConnectionState::Disconnected => {
                publish(
                    &self.state_tx,
                    &self.observer,
                    StateSnapshot {
                        state: ConnectionState::Closed,
                        close_reason: Some(CloseReason::Requested),
                        ..StateSnapshot::default()
                    },
                );
            }
            _ => {
                if let Some(run) = slot.as_ref() {
                    run.cancel.cancel();
                }
            }
        }
    }

    /// Stops the current run and waits until the state is `Closed`.
    ///
    /// Idempotent. Awaited from an inline-dispatched handler, this drops
    /// that handler together with the run; use
    /// [`request_close`](Self::request_close) there instead.
    pub async fn close(&self) {
        self.request_close();
        self.closed().await;
    }

    /// Spawns a driver for a fresh run if none is active.
    fn start(&self) {
        let mut slot = self.slot.lock();
        if self.state().is_active() {
            return;
        }

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        *slot = Some(RunHandle {
            cancel: cancel.clone(),
            outbound_tx,
        });

        publish(
            &self.state_tx,
            &self.observer,
            StateSnapshot {
                state: ConnectionState::Connecting,
                ..StateSnapshot::default()
            },
        );

        let driver = Driver {
            settings: Arc::clone(&self.settings),
            connector: Arc::clone(&self.connector),
            dispatcher: Arc::clone(&self.dispatcher),
            observer: Arc::clone(&self.observer),
            state_tx: Arc::clone(&self.state_tx),
            sessions: Arc::clone(&self.sessions),
            cancel,
            outbound_rx,
            backoff: Backoff::new(self.settings.backoff),
            session: 0,
        };

        let span = info_span!(
            "connection",
            channel = %self.settings.credentials.channel(),
            transport = self.connector.name(),
        );
        tokio::spawn(driver.run().instrument(span));
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(run) = self.slot.lock().as_ref() {
            run.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.settings.endpoint)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Publishes `next` and notifies the observer if the state changed.
fn publish(
    state_tx: &watch::Sender<StateSnapshot>,
    observer: &BoxedObserver,
    next: StateSnapshot,
) {
    let to = next.state;
    let from = state_tx.send_replace(next).state;
    if from != to {
        observer.on_state_change(from, to);
    }
}

// =============================================================================
// MessageSender
// =============================================================================

/// Sends chat messages through the current run.
///
/// Cheap to clone and safe to move into handlers.
#[derive(Clone)]
pub struct MessageSender {
    state_rx: watch::Receiver<StateSnapshot>,
    slot: RunSlot,
}

impl MessageSender {
    /// Sends one chat message.
    ///
    /// Fails with [`SendError::NotConnected`] unless the state is
    /// `Connected`; nothing is sent in that case.
    pub async fn send_message(&self, text: impl Into<String>) -> SendResult<()> {
        let snapshot = self.state_rx.borrow().clone();
        if !snapshot.is_connected() {
            return Err(SendError::NotConnected);
        }

        let outbound_tx = self
            .slot
            .lock()
            .as_ref()
            .map(|run| run.outbound_tx.clone())
            .ok_or(SendError::NotConnected)?;

        let (reply, reply_rx) = oneshot::channel();
        let request = OutboundRequest {
            frame: OutboundFrame::Chat(text.into()),
            session: snapshot.session,
            reply,
        };
        outbound_tx
            .send(request)
            .await
            .map_err(|_| SendError::NotConnected)?;

        reply_rx.await.unwrap_or(Err(SendError::NotConnected))
    }

    /// The state as of the last published snapshot.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().state
    }

    /// Asks the current run to stop, as [`Connection::request_close`] does.
    ///
    /// Meant for handlers: a no-op when no run is active.
    pub fn request_close(&self) {
        if let Some(run) = self.slot.lock().as_ref() {
            debug!("Close requested through sender");
            run.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender")
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Driver
// =============================================================================

enum AuthOutcome {
    Accepted,
    Rejected(AuthenticationError),
    Lost(TransportError),
    Cancelled,
}

enum ServeOutcome {
    Lost(TransportError),
    Cancelled,
}

/// State of one run, owned by its task.
struct Driver {
    settings: Arc<ConnectionSettings>,
    connector: BoxedConnector,
    dispatcher: Arc<Dispatcher>,
    observer: BoxedObserver,
    state_tx: Arc<watch::Sender<StateSnapshot>>,
    sessions: Arc<AtomicU64>,
    cancel: CancellationToken,
    outbound_rx: mpsc::Receiver<OutboundRequest>,
    backoff: Backoff,
    session: u64,
}

impl Driver {
    async fn run(mut self) {
        debug!("Connection run started");

        loop {
            self.set_state(ConnectionState::Connecting);

            let mut channel = match self.open().await {
                Some(Ok(channel)) => channel,
                Some(Err(err)) => {
                    self.observer.on_transport_error(&err);
                    if self.wait_backoff().await {
                        continue;
                    }
                    return;
                }
                None => return self.finish(CloseReason::Requested),
            };

            self.set_state(ConnectionState::Authenticating);
            match self.authenticate(&mut channel).await {
                AuthOutcome::Accepted => {}
                AuthOutcome::Rejected(err) => {
                    warn!(error = %err, "Authentication failed");
                    channel.sink.close().await;
                    return self.finish(CloseReason::Authentication(err));
                }
                AuthOutcome::Lost(err) => {
                    self.observer.on_transport_error(&err);
                    channel.sink.close().await;
                    if self.wait_backoff().await {
                        continue;
                    }
                    return;
                }
                AuthOutcome::Cancelled => {
                    channel.sink.close().await;
                    return self.finish(CloseReason::Requested);
                }
            }

            self.backoff.reset();
            if self.cancel.is_cancelled() {
                channel.sink.close().await;
                return self.finish(CloseReason::Requested);
            }

            self.session = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
            self.set_state(ConnectionState::Connected);
            info!(session = self.session, "Connected");

            let outcome = self.serve(&mut channel).await;
            self.reject_pending();
            channel.sink.close().await;

            match outcome {
                ServeOutcome::Cancelled => return self.finish(CloseReason::Requested),
                ServeOutcome::Lost(err) => {
                    self.observer.on_transport_error(&err);
                    if !self.wait_backoff().await {
                        return;
                    }
                }
            }
        }
    }

    /// Opens the transport. `None` means the run was cancelled.
    async fn open(&self) -> Option<Result<DuplexChannel, TransportError>> {
        let timeout = self.settings.connect_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            opened = tokio::time::timeout(timeout, self.connector.open(&self.settings.endpoint)) => {
                Some(opened.unwrap_or(Err(TransportError::Timeout {
                    operation: "open",
                    after: timeout,
                })))
            }
        }
    }

    async fn authenticate(&mut self, channel: &mut DuplexChannel) -> AuthOutcome {
        let frame = OutboundFrame::Authenticate(self.settings.credentials.clone()).encode();
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return AuthOutcome::Cancelled,
            sent = channel.sink.send(frame) => sent,
        };
        if let Err(err) = sent {
            return AuthOutcome::Lost(err);
        }
        debug!("Credentials sent, waiting for acknowledgement");

        let deadline = tokio::time::sleep(self.settings.auth_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return AuthOutcome::Cancelled,
                _ = &mut deadline => {
                    return AuthOutcome::Rejected(AuthenticationError::Timeout(
                        self.settings.auth_timeout,
                    ));
                }
                incoming = channel.stream.receive_next() => match incoming {
                    Ok(Incoming::Frame(raw)) => match parse_frame(&raw) {
                        Ok(frame) => {
                            self.observer.on_frame(&frame);
                            match frame {
                                InboundFrame::AuthAck => return AuthOutcome::Accepted,
                                InboundFrame::AuthReject { reason } => {
                                    return AuthOutcome::Rejected(AuthenticationError::Rejected {
                                        reason,
                                    });
                                }
                                other => {
                                    trace!(kind = other.kind(), "Absorbed frame before authentication");
                                }
                            }
                        }
                        Err(err) => self.observer.on_parse_error(&err, &raw),
                    },
                    Ok(Incoming::Closed) => {
                        return AuthOutcome::Lost(TransportError::closed(
                            "closed during authentication",
                        ));
                    }
                    Err(err) => return AuthOutcome::Lost(err),
                },
            }
        }
    }

    /// The `Connected` loop: one frame or one outbound request at a time.
    async fn serve(&mut self, channel: &mut DuplexChannel) -> ServeOutcome {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ServeOutcome::Cancelled,
                Some(request) = self.outbound_rx.recv() => {
                    if let Err(err) = deliver(channel.sink.as_mut(), request, self.session).await {
                        return ServeOutcome::Lost(err);
                    }
                }
                incoming = channel.stream.receive_next() => match incoming {
                    Ok(Incoming::Frame(raw)) => {
                        if let Some(outcome) = self.handle_frame(channel, &raw).await {
                            return outcome;
                        }
                    }
                    Ok(Incoming::Closed) => {
                        return ServeOutcome::Lost(TransportError::closed("closed by peer"));
                    }
                    Err(err) => return ServeOutcome::Lost(err),
                },
            }
        }
    }

    async fn handle_frame(&mut self, channel: &mut DuplexChannel, raw: &str) -> Option<ServeOutcome> {
        let frame = match parse_frame(raw) {
            Ok(frame) => frame,
            Err(err) => {
                self.observer.on_parse_error(&err, raw);
                return None;
            }
        };
        self.observer.on_frame(&frame);

        let messages = match frame {
            InboundFrame::Chat(messages) => messages,
            other => {
                trace!(kind = other.kind(), "Absorbed control frame");
                return None;
            }
        };

        for message in messages {
            if self.settings.ignore_self && message.sender_name() == self.settings.bot_name {
                trace!("Skipping own message");
                continue;
            }
            if let Some(outcome) = self.dispatch(channel, message).await {
                return Some(outcome);
            }
        }
        None
    }

    /// Runs one dispatch cycle while still serving sends and close requests,
    /// so handlers may reply before they return.
    async fn dispatch(&mut self, channel: &mut DuplexChannel, message: Message) -> Option<ServeOutcome> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let dispatch = dispatcher.dispatch(message);
        tokio::pin!(dispatch);

        let mut lost = None;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Some(ServeOutcome::Cancelled),
                _ = &mut dispatch => return lost.map(ServeOutcome::Lost),
                Some(request) = self.outbound_rx.recv() => {
                    if lost.is_some() {
                        let _ = request.reply.send(Err(SendError::NotConnected));
                    } else if let Err(err) = deliver(channel.sink.as_mut(), request, self.session).await {
                        // The handler may keep sending until it returns.
                        self.set_state(ConnectionState::Reconnecting);
                        lost = Some(err);
                    }
                }
            }
        }
    }

    /// Counts a failure and sleeps. Returns `false` if the run ended instead.
    async fn wait_backoff(&mut self) -> bool {
        self.backoff.record_failure();
        let attempts = self.backoff.attempt();

        if self.settings.max_retries.is_some_and(|max| attempts > max) {
            warn!(attempts, "Max retries reached, giving up");
            self.finish(CloseReason::RetriesExhausted { attempts });
            return false;
        }

        self.set_state(ConnectionState::Reconnecting);
        let delay = self.backoff.jittered_delay();
        warn!(attempt = attempts, delay = ?delay, "Reconnecting...");

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.finish(CloseReason::Requested);
                false
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Answers every queued send with `NotConnected`.
    fn reject_pending(&mut self) {
        while let Ok(request) = self.outbound_rx.try_recv() {
            let _ = request.reply.send(Err(SendError::NotConnected));
        }
    }

    fn finish(&mut self, reason: CloseReason) {
        self.reject_pending();
        self.outbound_rx.close();
        self.reject_pending();

        info!(reason = ?reason, "Connection closed");
        publish(
            &self.state_tx,
            &self.observer,
            StateSnapshot {
                state: ConnectionState::Closed,
                attempt: self.backoff.attempt(),
                session: self.session,
                close_reason: Some(reason),
            },
        );
    }

    fn set_state(&self, state: ConnectionState) {
        publish(
            &self.state_tx,
            &self.observer,
            StateSnapshot {
                state,
                attempt: self.backoff.attempt(),
                session: self.session,
                close_reason: None,
            },
        );
    }
}

/// Writes one queued request, unless it belongs to another session.
async fn deliver(
    sink: &mut dyn FrameSink,
    request: OutboundRequest,
    session: u64,
) -> Result<(), TransportError> {
    if request.session != session {
        let _ = request.reply.send(Err(SendError::NotConnected));
        return Ok(());
    }

    let kind = request.frame.kind();
    match sink.send(request.frame.encode()).await {
        Ok(()) => {
            trace!(kind, "Frame sent");
            let _ = request.reply.send(Ok(()));
            Ok(())
        }
        Err(err) => {
            let _ = request.reply.send(Err(SendError::Transport(err.clone())));
            Err(err)
        }
    }
}
