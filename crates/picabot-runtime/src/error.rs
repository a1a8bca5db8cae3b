//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while assembling a bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No connector was supplied and the `ws-client` feature is off.
    #[error("No transport connector configured; enable `ws-client` or call `connector()`")]
    MissingConnector,

    /// A builder setting is unusable.
    #[error("Invalid bot settings: {0}")]
    InvalidSettings(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
