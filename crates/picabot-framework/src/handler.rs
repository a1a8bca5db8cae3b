//! Handler traits for commands and events.
//!
//! Handlers are plain async closures. Command handlers receive the message
//! and the tokenized arguments, event handlers receive only the message:
//!
//! ```rust,ignore
//! dispatcher.register_command("echo", |msg: Arc<Message>, args: Vec<String>| async move {
//!     println!("{} asked to echo {:?}", msg.sender_name(), args);
//! })?;
//!
//! dispatcher.register_event("message", |msg: Arc<Message>| async move {
//!     anyhow::ensure!(!msg.text().is_empty(), "empty message");
//!     Ok(())
//! });
//! ```
//!
//! A handler may return `()` or `Result<(), E>` for any displayable `E`.
//! Errors are reported through the observer; they never reach the reader loop.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use picabot_core::Message;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler invocation produced, with the error already rendered.
pub type HandlerResult = Result<(), String>;

// ============================================================================
// Return types
// ============================================================================

/// Conversion from a handler's return value into a [`HandlerResult`].
pub trait IntoHandlerResult {
    /// Performs the conversion.
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E: Display> IntoHandlerResult for Result<(), E> {
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(|e| format!("{e:#}"))
    }
}

// ============================================================================
// Command handlers
// ============================================================================

/// A handler bound to one command name.
pub trait CommandHandler: Send + Sync + 'static {
    /// Starts one invocation.
    ///
    /// The dispatcher calls this in registration order; the returned future
    /// may then run concurrently with other handlers.
    fn call(&self, message: Arc<Message>, args: Vec<String>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> CommandHandler for F
where
    F: Fn(Arc<Message>, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call(&self, message: Arc<Message>, args: Vec<String>) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(message, args);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// A type-erased command handler.
pub type BoxedCommandHandler = Arc<dyn CommandHandler>;

// ============================================================================
// Event handlers
// ============================================================================

/// A handler appended to an event name.
pub trait EventHandler: Send + Sync + 'static {
    /// Starts one invocation.
    fn call(&self, message: Arc<Message>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn call(&self, message: Arc<Message>) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(message);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// A type-erased event handler.
pub type BoxedEventHandler = Arc<dyn EventHandler>;
