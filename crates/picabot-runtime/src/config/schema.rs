//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use picabot_core::Endpoint;
use picabot_framework::{ArgSplit, DEFAULT_PREFIX, DispatchMode};
use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PicabotConfig {
    /// Chat server endpoint.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bot identity and command settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Reconnection and timeout policy.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Handler dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Server
// =============================================================================

/// Chat server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name, optionally with a port.
    #[serde(default = "default_host")]
    pub host: String,

    /// Path of the chat socket.
    #[serde(default = "default_path")]
    pub path: String,

    /// Use TLS (`wss://`).
    #[serde(default = "default_true")]
    pub secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            path: default_path(),
            secure: true,
        }
    }
}

impl ServerConfig {
    /// The endpoint described by this section.
    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone())
            .with_path(self.path.clone())
            .with_secure(self.secure)
    }
}

fn default_host() -> String {
    Endpoint::default().server
}

fn default_path() -> String {
    Endpoint::default().path
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Bot
// =============================================================================

/// Bot identity and command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Channel to join. Used when no channel is given on the command line.
    #[serde(default)]
    pub channel: Option<String>,

    /// Account name. Used when no username is given on the command line.
    #[serde(default)]
    pub username: Option<String>,

    /// Display name used to recognise the bot's own messages.
    /// Defaults to the username.
    #[serde(default)]
    pub bot_name: Option<String>,

    /// Prefix that marks a chat message as a command.
    #[serde(default = "default_prefix")]
    pub command_prefix: String,

    /// Do not dispatch messages sent by the bot itself.
    #[serde(default = "default_true")]
    pub ignore_self: bool,

    /// How command arguments are split.
    #[serde(default)]
    pub arg_split: ArgSplit,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            channel: None,
            username: None,
            bot_name: None,
            command_prefix: default_prefix(),
            ignore_self: true,
            arg_split: ArgSplit::default(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

// =============================================================================
// Connection
// =============================================================================

/// Reconnection and timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backoff unit in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Relative jitter applied to each delay, in `[0, 1)`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Reconnection ceiling. Absent means unbounded.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Authentication timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub auth_timeout_ms: u64,

    /// Transport open timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
            max_retries: None,
            auth_timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    /// Converts to the runtime backoff policy.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }

    /// Authentication timeout.
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    /// Transport open timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> f64 {
    0.2
}

fn default_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Dispatch
// =============================================================================

/// Handler dispatch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// `spawned` (one task per handler) or `inline`.
    #[serde(default)]
    pub mode: DispatchMode,
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as accepted by `EnvFilter` directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// File rotation for `LogOutput::File`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level. `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file for `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module levels, e.g. `picabot_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
            span_events: SpanEventConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PicabotConfig::default();
        assert_eq!(config.server.to_endpoint().url(), "wss://chat.picarto.tv/chat");
        assert_eq!(config.bot.command_prefix, "!");
        assert!(config.bot.ignore_self);
        assert_eq!(config.connection.max_retries, None);
        assert_eq!(config.dispatch.mode, DispatchMode::Spawned);

        let policy = config.connection.backoff_policy();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(config.connection.auth_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_log_level_conversions() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::default().to_string(), "info");
    }
}
