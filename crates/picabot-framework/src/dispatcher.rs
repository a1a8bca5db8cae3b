//! Message dispatcher for the picabot framework.
//!
//! The [`Dispatcher`] owns the command and event registries of one bot
//! instance. For every chat message it:
//!
//! 1. Parses a command invocation out of the text (prefix, name, args)
//! 2. Invokes the bound command handler, if the name is bound
//! 3. Invokes every `"message"` event handler, in registration order
//!
//! An unbound command name is not an error; the message still reaches the
//! event handlers unchanged.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new("!");
//!
//! dispatcher.register_command("hello", |msg: Arc<Message>, _args: Vec<String>| async move {
//!     tracing::info!(from = msg.sender_name(), "hello");
//! })?;
//!
//! dispatcher.register_event(MESSAGE_EVENT, |msg: Arc<Message>| async move {
//!     tracing::debug!(text = msg.text(), "chat");
//! });
//!
//! dispatcher.dispatch(message).await.wait().await;
//! ```
//!
//! # Failure containment
//!
//! Every handler invocation is isolated. An `Err` return or a panic, whether
//! raised while creating the future or while polling it, is reported through
//! the observer as a [`HandlerError`] and never stops the remaining handlers.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, future};
use parking_lot::RwLock;
use picabot_core::{
    BoxedObserver, HandlerError, HandlerSource, Message, RegistrationError, tracing_observer,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span};

use crate::command::{CommandRegistry, parse_invocation};
use crate::event::{EventRegistry, MESSAGE_EVENT};
use crate::handler::{
    BoxFuture, BoxedCommandHandler, BoxedEventHandler, CommandHandler, EventHandler,
    HandlerResult,
};
use crate::split::ArgSplit;

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "!";

/// How handler futures are driven once created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// The invocations of one message run together on a tokio task, so a
    /// slow handler never stalls the reader loop. They are first polled in
    /// the order they were created.
    #[default]
    Spawned,
    /// Invocations are awaited one after another before `dispatch` returns.
    Inline,
}

/// Outcome of one dispatch cycle.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Name of the command handler that was invoked, if any.
    pub command: Option<String>,
    /// Number of event handlers invoked.
    pub event_handlers: usize,
    /// Task driving the invocations. `None` in inline mode or when nothing
    /// was invoked.
    pub task: Option<JoinHandle<()>>,
}

impl DispatchReport {
    /// Total number of handlers invoked.
    pub fn invoked(&self) -> usize {
        usize::from(self.command.is_some()) + self.event_handlers
    }

    /// Waits for every spawned invocation to finish.
    pub async fn wait(self) {
        if let Some(task) = self.task {
            // Invocations catch their own panics; a join error means the
            // runtime is shutting down.
            let _ = task.await;
        }
    }
}

#[derive(Default)]
struct Registry {
    commands: CommandRegistry,
    events: EventRegistry,
}

/// Routes chat messages to command and event handlers.
///
/// `Dispatcher` is `Send + Sync`; registration takes `&self` and may happen
/// at any time, including while messages are being dispatched.
pub struct Dispatcher {
    registry: RwLock<Registry>,
    prefix: String,
    arg_split: ArgSplit,
    mode: DispatchMode,
    observer: BoxedObserver,
}

impl Dispatcher {
    /// Creates a dispatcher with the given command prefix and defaults for
    /// everything else.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            prefix: prefix.into(),
            arg_split: ArgSplit::default(),
            mode: DispatchMode::default(),
            observer: tracing_observer(),
        }
    }

    /// Sets the argument splitting mode.
    pub fn with_arg_split(mut self, arg_split: ArgSplit) -> Self {
        self.arg_split = arg_split;
        self
    }

    /// Sets how handler futures are driven.
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the observer that receives handler failures.
    pub fn with_observer(mut self, observer: BoxedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// The command prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The dispatch mode.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Binds a handler to a command name.
    ///
    /// Fails if the name is already bound or is not a single token.
    pub fn register_command<F, Fut>(
        &self,
        name: impl Into<String>,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(Arc<Message>, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: crate::handler::IntoHandlerResult,
    {
        self.register_command_boxed(name, Arc::new(handler))
    }

    /// Binds an already type-erased handler to a command name.
    pub fn register_command_boxed(
        &self,
        name: impl Into<String>,
        handler: BoxedCommandHandler,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        self.registry.write().commands.register(name.clone(), handler)?;
        debug!(command = %name, "Command registered");
        Ok(())
    }

    /// Appends a handler to an event name. Never fails.
    pub fn register_event<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: crate::handler::IntoHandlerResult,
    {
        self.register_event_boxed(name, Arc::new(handler));
    }

    /// Appends an already type-erased handler to an event name.
    pub fn register_event_boxed(&self, name: impl Into<String>, handler: BoxedEventHandler) {
        let name = name.into();
        debug!(event = %name, "Event handler registered");
        self.registry.write().events.register(name, handler);
    }

    /// Names of the bound commands, sorted.
    pub fn command_names(&self) -> Vec<String> {
        self.registry.read().commands.names()
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.registry.read().events.handler_count(event)
    }

    /// Runs one dispatch cycle for `message`.
    ///
    /// Handler futures are created in order: the command handler first, then
    /// the `"message"` handlers in registration order. In [`DispatchMode::Spawned`]
    /// they are handed to one task that polls them in that order; in
    /// [`DispatchMode::Inline`] they are awaited one by one before this returns.
    pub async fn dispatch(&self, message: Message) -> DispatchReport {
        let message = Arc::new(message);
        let invocation = parse_invocation(message.text(), &self.prefix, self.arg_split);

        let (command, events) = {
            let registry = self.registry.read();
            let command = invocation.and_then(|inv| {
                registry
                    .commands
                    .get(&inv.name)
                    .map(|handler| (inv, handler))
            });
            (command, registry.events.handlers(MESSAGE_EVENT))
        };

        let mut report = DispatchReport {
            command: command.as_ref().map(|(inv, _)| inv.name.clone()),
            event_handlers: events.len(),
            task: None,
        };

        debug!(
            sender = message.sender_name(),
            command = report.command.as_deref(),
            event_handlers = report.event_handlers,
            "Dispatching message"
        );

        let mut pending = Vec::with_capacity(report.invoked());

        if let Some((inv, handler)) = command {
            let source = HandlerSource::Command(inv.name);
            let msg = Arc::clone(&message);
            let args = inv.args;
            if let Some(run) = self.start(source, move || {
                CommandHandler::call(handler.as_ref(), msg, args)
            }) {
                self.drive_or_defer(run, &mut pending).await;
            }
        }

        for (index, handler) in events.into_iter().enumerate() {
            let source = HandlerSource::Event {
                name: MESSAGE_EVENT.to_string(),
                index,
            };
            let msg = Arc::clone(&message);
            let run = self.start(source, move || EventHandler::call(handler.as_ref(), msg));
            if let Some(run) = run {
                self.drive_or_defer(run, &mut pending).await;
            }
        }

        if !pending.is_empty() {
            report.task = Some(tokio::spawn(async move {
                future::join_all(pending).await;
            }));
        }

        report
    }

    /// Creates one handler future wrapped in its failure reporting.
    ///
    /// A panic raised while creating the future is contained here.
    fn start<F>(&self, source: HandlerSource, create: F) -> Option<BoxFuture<'static, ()>>
    where
        F: FnOnce() -> BoxFuture<'static, HandlerResult>,
    {
        let future = match std::panic::catch_unwind(AssertUnwindSafe(create)) {
            Ok(future) => future,
            Err(payload) => {
                self.observer.on_handler_error(&HandlerError {
                    source_handler: source,
                    reason: panic_message(payload.as_ref()),
                    panicked: true,
                });
                return None;
            }
        };

        let span = debug_span!("handler", handler = %source);
        Some(Box::pin(
            drive(source, future, Arc::clone(&self.observer)).instrument(span),
        ))
    }

    async fn drive_or_defer(
        &self,
        run: BoxFuture<'static, ()>,
        pending: &mut Vec<BoxFuture<'static, ()>>,
    ) {
        match self.mode {
            DispatchMode::Spawned => pending.push(run),
            DispatchMode::Inline => run.await,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Dispatcher")
            .field("prefix", &self.prefix)
            .field("arg_split", &self.arg_split)
            .field("mode", &self.mode)
            .field("commands", &registry.commands)
            .field("events", &registry.events)
            .finish()
    }
}

/// Polls one handler future to completion and reports its failure.
async fn drive(
    source: HandlerSource,
    future: BoxFuture<'static, HandlerResult>,
    observer: BoxedObserver,
) {
    let (reason, panicked) = match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => return,
        Ok(Err(reason)) => (reason, false),
        Err(payload) => (panic_message(payload.as_ref()), true),
    };
    observer.on_handler_error(&HandlerError {
        source_handler: source,
        reason,
        panicked,
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
