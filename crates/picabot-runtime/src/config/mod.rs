//! Configuration module for the picabot runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for the server endpoint, bot identity, connection policy, dispatch and
//! logging. Secrets are never read from configuration files.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, ConnectionConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PicabotConfig, ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
