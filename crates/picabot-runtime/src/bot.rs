//! The bot facade.
//!
//! [`PicaBot`] ties a [`Dispatcher`] to a [`Connection`] and is what
//! applications use:
//!
//! ```rust,ignore
//! let bot = PicaBot::builder(Credentials::token("mybot", token, "studio"))
//!     .prefix("!")
//!     .build()?;
//!
//! let sender = bot.sender();
//! bot.command("ping", move |_msg, _args| {
//!     let sender = sender.clone();
//!     async move { sender.send_message("pong").await }
//! })?;
//!
//! bot.run_until_shutdown().await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use picabot_core::{
    BoxedConnector, BoxedObserver, CloseReason, ConnectError, Connector, ConnectionState,
    Credentials, Endpoint, Message, RegistrationError, SendResult, StateSnapshot,
    tracing_observer,
};
use picabot_framework::{ArgSplit, DEFAULT_PREFIX, DispatchMode, Dispatcher, IntoHandlerResult};

use crate::backoff::BackoffPolicy;
use crate::config::PicabotConfig;
use crate::connection::{Connection, ConnectionSettings, MessageSender};
use crate::error::{RuntimeError, RuntimeResult};

/// A chat bot bound to one channel.
pub struct PicaBot {
    connection: Connection,
    dispatcher: Arc<Dispatcher>,
}

impl PicaBot {
    /// Starts building a bot that authenticates with `credentials`.
    pub fn builder(credentials: Credentials) -> PicaBotBuilder {
        PicaBotBuilder::new(credentials)
    }

    /// Binds `handler` to `<prefix><name>`.
    ///
    /// Fails if `name` is already bound or is not a single token.
    pub fn command<F, Fut>(&self, name: impl Into<String>, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Message>, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.dispatcher.register_command(name, handler)
    }

    /// Appends `handler` to the handlers of `event`.
    ///
    /// Every chat message fires [`MESSAGE_EVENT`](picabot_framework::MESSAGE_EVENT).
    pub fn on<F, Fut>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        self.dispatcher.register_event(event, handler);
    }

    /// Sends a chat message to the channel. Only succeeds while `Connected`.
    pub async fn send_message(&self, text: impl Into<String>) -> SendResult<()> {
        self.connection.sender().send_message(text).await
    }

    /// Connects and waits until the bot is authenticated.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        self.connection.connect().await
    }

    /// Stops the bot and waits until it is `Closed`. Idempotent.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    /// Asks the bot to stop without waiting.
    pub fn request_close(&self) {
        self.connection.request_close();
    }

    /// Waits until the bot is `Closed` and returns why.
    pub async fn closed(&self) -> Option<CloseReason> {
        self.connection.closed().await
    }

    /// Connects, then serves until the bot is closed.
    ///
    /// Returns `Ok` if the bot was closed on request, and the fatal error
    /// otherwise.
    pub async fn run(&self) -> Result<(), ConnectError> {
        self.connect().await?;
        match self.closed().await {
            None | Some(CloseReason::Requested) => Ok(()),
            Some(reason) => Err(reason.into_connect_error()),
        }
    }

    /// Like [`run`](Self::run), but closes the bot once `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ConnectError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            () = shutdown => {
                info!("Shutdown requested, closing bot");
                self.close().await;
                Ok(())
            }
        }
    }

    /// Runs until Ctrl+C (or SIGTERM on Unix).
    pub async fn run_until_shutdown(&self) -> Result<(), ConnectError> {
        self.run_until(shutdown_signal()).await
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Current snapshot, including attempt and session counters.
    pub fn snapshot(&self) -> StateSnapshot {
        self.connection.snapshot()
    }

    /// Receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.connection.subscribe()
    }

    /// A cloneable sending handle for use inside handlers.
    pub fn sender(&self) -> MessageSender {
        self.connection.sender()
    }

    /// The dispatcher, for registering pre-boxed handlers.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The settings the connection runs with.
    pub fn settings(&self) -> &ConnectionSettings {
        self.connection.settings()
    }
}

impl std::fmt::Debug for PicaBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PicaBot")
            .field("connection", &self.connection)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Completes on Ctrl+C, or on SIGTERM on Unix.
///
/// If no signal handler can be installed this never completes.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => ctrl_c_received(result).await,
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                ctrl_c_received(tokio::signal::ctrl_c().await).await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c_received(tokio::signal::ctrl_c().await).await;
}

async fn ctrl_c_received(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`PicaBot`].
pub struct PicaBotBuilder {
    settings: ConnectionSettings,
    bot_name: Option<String>,
    connector: Option<BoxedConnector>,
    prefix: String,
    arg_split: ArgSplit,
    mode: DispatchMode,
    observer: BoxedObserver,
}

impl PicaBotBuilder {
    /// Defaults: the Picarto endpoint, prefix `!`, spawned dispatch,
    /// unbounded retries and the tracing observer.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            settings: ConnectionSettings::new(credentials),
            bot_name: None,
            connector: None,
            prefix: DEFAULT_PREFIX.to_string(),
            arg_split: ArgSplit::default(),
            mode: DispatchMode::default(),
            observer: tracing_observer(),
        }
    }

    /// Applies every setting in `config`. Credentials are not part of it.
    pub fn config(mut self, config: &PicabotConfig) -> Self {
        self.settings.endpoint = config.server.to_endpoint();
        self.settings.backoff = config.connection.backoff_policy();
        self.settings.max_retries = config.connection.max_retries;
        self.settings.auth_timeout = config.connection.auth_timeout();
        self.settings.connect_timeout = config.connection.connect_timeout();
        self.settings.ignore_self = config.bot.ignore_self;
        self.bot_name.clone_from(&config.bot.bot_name);
        self.prefix.clone_from(&config.bot.command_prefix);
        self.arg_split = config.bot.arg_split;
        self.mode = config.dispatch.mode;
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.settings.endpoint = endpoint;
        self
    }

    /// Uses `connector` instead of the WebSocket client.
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Display name used to recognise the bot's own messages.
    pub fn bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = Some(name.into());
        self
    }

    pub fn ignore_self(mut self, ignore: bool) -> Self {
        self.settings.ignore_self = ignore;
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.settings.backoff = policy;
        self
    }

    /// Reconnection ceiling; `None` retries forever.
    pub fn max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.settings.max_retries = max_retries;
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.settings.auth_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = timeout;
        self
    }

    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn arg_split(mut self, arg_split: ArgSplit) -> Self {
        self.arg_split = arg_split;
        self
    }

    /// Receives state changes, parse errors and handler failures.
    pub fn observer(mut self, observer: BoxedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Builds the bot. Nothing connects until [`PicaBot::connect`].
    pub fn build(mut self) -> RuntimeResult<PicaBot> {
        if self.prefix.is_empty() || self.prefix.chars().any(char::is_whitespace) {
            return Err(RuntimeError::InvalidSettings(format!(
                "command prefix must be non-empty and contain no whitespace: {:?}",
                self.prefix
            )));
        }
        if self.settings.credentials.channel().trim().is_empty() {
            return Err(RuntimeError::InvalidSettings("channel cannot be empty".into()));
        }
        let backoff = &self.settings.backoff;
        if backoff.base_delay.is_zero() {
            return Err(RuntimeError::InvalidSettings(
                "backoff base delay must be greater than 0".into(),
            ));
        }
        if backoff.max_delay < backoff.base_delay {
            return Err(RuntimeError::InvalidSettings(
                "backoff max delay must not be below the base delay".into(),
            ));
        }
        if !(0.0..1.0).contains(&backoff.jitter) {
            return Err(RuntimeError::InvalidSettings(format!(
                "backoff jitter must be in [0, 1): {}",
                backoff.jitter
            )));
        }

        if let Some(name) = self.bot_name.take() {
            self.settings.bot_name = name;
        }
        let connector = match self.connector.take() {
            Some(connector) => connector,
            None => default_connector()?,
        };

        let dispatcher = Arc::new(
            Dispatcher::new(self.prefix)
                .with_arg_split(self.arg_split)
                .with_mode(self.mode)
                .with_observer(Arc::clone(&self.observer)),
        );

        info!(
            endpoint = %self.settings.endpoint,
            channel = %self.settings.credentials.channel(),
            transport = connector.name(),
            "Bot created"
        );

        let connection = Connection::new(
            self.settings,
            connector,
            Arc::clone(&dispatcher),
            self.observer,
        );
        Ok(PicaBot {
            connection,
            dispatcher,
        })
    }
}

#[cfg(feature = "ws-client")]
fn default_connector() -> RuntimeResult<BoxedConnector> {
    Ok(Arc::new(picabot_transport::WsConnector::new()))
}

#[cfg(not(feature = "ws-client"))]
fn default_connector() -> RuntimeResult<BoxedConnector> {
    Err(RuntimeError::MissingConnector)
}

impl std::fmt::Debug for PicaBotBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PicaBotBuilder")
            .field("settings", &self.settings)
            .field("prefix", &self.prefix)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picabot_core::{OutboundFrame, SendError};
    use picabot_framework::MESSAGE_EVENT;
    use picabot_transport::memory::{self, MemoryPeer, MemoryServer};
    use tokio::sync::{mpsc, oneshot};

    const ACK: &str = r#"{"t":"auth","ok":true}"#;

    fn credentials() -> Credentials {
        Credentials::token("picabot", "secret-token", "studio")
    }

    fn bot() -> (Arc<PicaBot>, MemoryServer) {
        let (connector, server) = memory::pair();
        let bot = PicaBot::builder(credentials())
            .connector(connector)
            .backoff(BackoffPolicy {
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(1),
                jitter: 0.0,
            })
            .build()
            .unwrap();
        (Arc::new(bot), server)
    }

    fn chat(sender: &str, text: &str) -> String {
        format!(r#"{{"t":"c","m":[{{"n":"{sender}","m":"{text}"}}]}}"#)
    }

    async fn accept_and_ack(server: &mut MemoryServer) -> MemoryPeer {
        let mut peer = server.accept().await.unwrap();
        peer.recv().await.unwrap();
        peer.send(ACK).unwrap();
        peer
    }

    async fn wait_for(bot: &PicaBot, state: ConnectionState) {
        let mut rx = bot.subscribe();
        rx.wait_for(|s| s.state == state).await.unwrap();
    }

    #[test]
    fn test_builder_rejects_bad_prefix() {
        let (connector, _server) = memory::pair();
        let err = PicaBot::builder(credentials())
            .connector(connector)
            .prefix("")
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidSettings(_)));
    }

    #[test]
    fn test_builder_rejects_empty_channel() {
        let (connector, _server) = memory::pair();
        let err = PicaBot::builder(Credentials::token("picabot", "t", " "))
            .connector(connector)
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidSettings(_)));
    }

    #[test]
    fn test_builder_rejects_bad_backoff() {
        for jitter in [f64::NAN, -0.1, 1.0] {
            let (connector, _server) = memory::pair();
            let err = PicaBot::builder(credentials())
                .connector(connector)
                .backoff(BackoffPolicy {
                    jitter,
                    ..BackoffPolicy::default()
                })
                .build()
                .unwrap_err();
            assert!(matches!(err, RuntimeError::InvalidSettings(_)), "jitter {jitter}");
        }

        let (connector, _server) = memory::pair();
        let err = PicaBot::builder(credentials())
            .connector(connector)
            .backoff(BackoffPolicy {
                base_delay: Duration::from_secs(10),
                max_delay: Duration::from_secs(1),
                jitter: 0.0,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidSettings(_)));
    }

    #[cfg(not(feature = "ws-client"))]
    #[test]
    fn test_builder_needs_connector() {
        let err = PicaBot::builder(credentials()).build().unwrap_err();
        assert!(matches!(err, RuntimeError::MissingConnector));
    }

    #[test]
    fn test_builder_applies_config() {
        let mut config = PicabotConfig::default();
        config.server.host = "localhost:9000".into();
        config.server.secure = false;
        config.bot.command_prefix = "?".into();
        config.bot.bot_name = Some("PicaBot".into());
        config.connection.max_retries = Some(3);
        config.connection.auth_timeout_ms = 500;
        config.dispatch.mode = DispatchMode::Inline;

        let (connector, _server) = memory::pair();
        let bot = PicaBot::builder(credentials())
            .config(&config)
            .connector(connector)
            .build()
            .unwrap();

        assert_eq!(bot.dispatcher().prefix(), "?");
        assert_eq!(bot.dispatcher().mode(), DispatchMode::Inline);
        assert_eq!(bot.settings().endpoint.url(), "ws://localhost:9000/chat");
        assert_eq!(bot.settings().bot_name, "PicaBot");
        assert_eq!(bot.settings().max_retries, Some(3));
        assert_eq!(bot.settings().auth_timeout, Duration::from_millis(500));
        assert_eq!(bot.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_duplicate_command() {
        let (bot, _server) = bot();
        bot.command("ping", |_msg, _args| async {}).unwrap();
        let err = bot.command("ping", |_msg, _args| async {}).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateCommand { name } if name == "ping"));
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let (bot, server) = bot();
        let err = bot.send_message("hello?").await.unwrap_err();
        assert!(matches!(err, SendError::NotConnected));
        assert_eq!(server.open_count(), 0);
    }

    #[tokio::test]
    async fn test_command_replies_through_sender() {
        let (bot, mut server) = bot();
        let sender = bot.sender();
        bot.command("echo", move |_msg, args: Vec<String>| {
            let sender = sender.clone();
            async move { sender.send_message(args.join(" ")).await }
        })
        .unwrap();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bot.on(MESSAGE_EVENT, move |msg: Arc<Message>| {
            let seen_tx = seen_tx.clone();
            async move {
                let _ = seen_tx.send(msg.text().to_string());
            }
        });

        let connecting = tokio::spawn({
            let bot = Arc::clone(&bot);
            async move { bot.connect().await }
        });
        let mut peer = accept_and_ack(&mut server).await;
        connecting.await.unwrap().unwrap();
        assert_eq!(bot.state(), ConnectionState::Connected);

        peer.send(chat("alice", "!echo hello there")).unwrap();
        assert_eq!(
            peer.recv().await.unwrap(),
            OutboundFrame::Chat("hello there".into()).encode()
        );
        assert_eq!(seen_rx.recv().await.unwrap(), "!echo hello there");

        bot.send_message("bye").await.unwrap();
        assert_eq!(
            peer.recv().await.unwrap(),
            OutboundFrame::Chat("bye".into()).encode()
        );

        bot.close().await;
        assert_eq!(bot.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_run_returns_ok_when_a_handler_closes() {
        let (bot, mut server) = bot();
        let sender = bot.sender();
        bot.command("quit", move |_msg, _args| {
            let sender = sender.clone();
            async move { sender.request_close() }
        })
        .unwrap();

        let running = tokio::spawn({
            let bot = Arc::clone(&bot);
            async move { bot.run().await }
        });
        let peer = accept_and_ack(&mut server).await;
        wait_for(&bot, ConnectionState::Connected).await;

        peer.send(chat("alice", "!quit")).unwrap();
        assert_eq!(running.await.unwrap(), Ok(()));
        assert_eq!(bot.snapshot().close_reason, Some(CloseReason::Requested));
    }

    #[tokio::test]
    async fn test_run_reports_rejection() {
        let (bot, mut server) = bot();
        let running = tokio::spawn({
            let bot = Arc::clone(&bot);
            async move { bot.run().await }
        });

        let mut peer = server.accept().await.unwrap();
        peer.recv().await.unwrap();
        peer.send(r#"{"t":"auth","ok":false,"reason":"bad token"}"#)
            .unwrap();

        let err = running.await.unwrap().unwrap_err();
        assert!(matches!(err, ConnectError::Authentication(_)));
        assert_eq!(bot.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_run_until_shutdown_future() {
        let (bot, mut server) = bot();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let running = tokio::spawn({
            let bot = Arc::clone(&bot);
            async move {
                bot.run_until(async {
                    let _ = stop_rx.await;
                })
                .await
            }
        });
        let _peer = accept_and_ack(&mut server).await;
        wait_for(&bot, ConnectionState::Connected).await;

        stop_tx.send(()).unwrap();
        assert_eq!(running.await.unwrap(), Ok(()));
        assert_eq!(bot.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_close_before_connect() {
        let (bot, server) = bot();
        bot.close().await;
        assert_eq!(bot.state(), ConnectionState::Closed);
        assert_eq!(bot.closed().await, Some(CloseReason::Requested));
        assert_eq!(server.open_count(), 0);
    }
}
