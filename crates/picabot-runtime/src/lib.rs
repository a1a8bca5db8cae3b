//! # picabot runtime
//!
//! Runs a picabot bot: the connection state machine, reconnection backoff,
//! configuration loading and logging setup.
//!
//! - [`PicaBot`] / [`PicaBotBuilder`]: the facade applications use
//! - [`Connection`]: the state machine behind it, one driver task per run
//! - [`Backoff`]: `min(max, base * 2^attempt)` with jitter
//! - [`config`]: figment-based loading (`picabot.toml`, `PICABOT_*`)
//! - [`logging`]: `tracing-subscriber` setup driven by [`LoggingConfig`]
//!
//! ```ignore
//! use picabot_runtime::{PicaBot, config, logging};
//! use picabot_core::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let bot = PicaBot::builder(Credentials::token("mybot", "token", "studio"))
//!         .config(&config)
//!         .build()?;
//!     bot.on("message", |msg| async move {
//!         tracing::info!(from = msg.sender_name(), "{}", msg.text());
//!     });
//!
//!     bot.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ─connect─▶ Connecting ─open─▶ Authenticating ─ack─▶ Connected
//!                            ▲                   │    │              │
//!                            │          transient│    │reject        │lost
//!                            └── Reconnecting ◀──┘    ▼              │
//!                                    ▲              Closed           │
//!                                    └───────────────────────────────┘
//! ```
//!
//! `close()` reaches `Closed` from every state.

pub mod backoff;
pub mod bot;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;

pub use backoff::{Backoff, BackoffPolicy};
pub use bot::{PicaBot, PicaBotBuilder, shutdown_signal};
pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PicabotConfig};
pub use connection::{Connection, ConnectionSettings, MessageSender};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
