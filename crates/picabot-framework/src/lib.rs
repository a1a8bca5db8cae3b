//! # picabot framework
//!
//! Command and event dispatch for picabot bots.
//!
//! This layer provides:
//! - Handler traits over plain async closures ([`CommandHandler`], [`EventHandler`])
//! - Instance-owned command and event registries
//! - Command parsing with configurable prefix and argument splitting
//! - The [`Dispatcher`], which isolates every handler invocation
//!
//! The framework knows nothing about connections; the runtime feeds it
//! [`Message`](picabot_core::Message)s one dispatch cycle at a time.

pub mod command;
pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod split;

pub use command::{CommandInvocation, CommandRegistry, parse_invocation};
pub use dispatcher::{DEFAULT_PREFIX, DispatchMode, DispatchReport, Dispatcher};
pub use event::{EventRegistry, MESSAGE_EVENT};
pub use handler::{
    BoxFuture, BoxedCommandHandler, BoxedEventHandler, CommandHandler, EventHandler,
    HandlerResult, IntoHandlerResult,
};
pub use split::{ArgSplit, split_args};
