//! # picabot
//!
//! An async chat bot client for Picarto channels.
//!
//! ## Overview
//!
//! A bot authenticates against one channel, keeps the connection alive with
//! exponential backoff, and routes every chat message to user handlers:
//!
//! ```text
//! ┌───────────┐     ┌───────────────┐     ┌────────────┐────▶ command handler
//! │ WebSocket │────▶│ State machine │────▶│ Dispatcher │────▶ "message" handler
//! │ transport │◀────│  (one task)   │     │            │────▶ "message" handler
//! └───────────┘     └───────────────┘     └────────────┘
//! ```
//!
//! - A message starting with the prefix (default `!`) runs the handler bound
//!   to the command name with the remaining words as arguments.
//! - Every message, command or not, fires the `"message"` event.
//! - A failing or panicking handler is logged and never stops the others.
//! - Authentication rejection is fatal; lost connections are retried.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use picabot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = PicaBot::builder(Credentials::token("mybot", "token", "studio")).build()?;
//!
//!     let sender = bot.sender();
//!     bot.command("ping", move |_msg, _args| {
//!         let sender = sender.clone();
//!         async move { sender.send_message("pong").await }
//!     })?;
//!
//!     bot.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `ws-client` *(default)*: WebSocket transport via `tokio-tungstenite`
//! - `toml-config` *(default)*: `picabot.toml` configuration files
//! - `yaml-config`: `picabot.yaml` configuration files
//! - `json-log`: JSON log output

pub use picabot_core as core;
pub use picabot_framework as framework;
pub use picabot_runtime as runtime;
pub use picabot_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use picabot::prelude::*;
/// ```
pub mod prelude {
    // Facade
    pub use picabot_runtime::{MessageSender, PicaBot, PicaBotBuilder};

    // Configuration and logging
    pub use picabot_runtime::config::{ConfigLoader, PicabotConfig, load_config};
    pub use picabot_runtime::logging::{self, LoggingBuilder};

    // Handler side
    pub use picabot_core::{Credentials, Endpoint, Message};
    pub use picabot_framework::{ArgSplit, DispatchMode, MESSAGE_EVENT};

    // Lifecycle and errors
    pub use picabot_core::{
        CloseReason, ConnectError, ConnectionState, RegistrationError, SendError, StateSnapshot,
    };
}
