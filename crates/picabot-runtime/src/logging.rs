//! Logging setup for picabot.
//!
//! Installs one `tracing-subscriber` registry with an `EnvFilter` and a
//! single fmt layer, all driven by [`LoggingConfig`]. `RUST_LOG` replaces
//! the configured base level; the per-module `filters` are always applied
//! on top of it.
//!
//! ```rust,ignore
//! let config = picabot_runtime::config::load_config()?;
//! picabot_runtime::logging::init_from_config(&config.logging);
//! ```
//!
//! The driver runs inside a `connection` span and every handler inside a
//! `handler` span, so enabling `span_events.new` and `span_events.close`
//! shows each run and each handler invocation with its busy/idle time.

use std::ffi::OsStr;
use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "picabot.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initializes logging from a `LoggingConfig`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Builds the global subscriber from a [`LoggingConfig`] plus extra filter
/// directives.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    extra: Vec<String>,
}

impl LoggingBuilder {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
            extra: Vec::new(),
        }
    }

    /// Adds a filter directive such as `picabot_transport=trace`.
    ///
    /// Applied after the configured `filters`, so it wins on conflicts.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.extra.push(directive.into());
        self
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.filter();
        tracing_subscriber::registry()
            .with(self.layer())
            .with(filter)
            .try_init()
    }

    /// Per-module directives in the order they are applied.
    fn directives(&self) -> Vec<String> {
        let mut filters: Vec<_> = self.config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));
        filters
            .into_iter()
            .map(|(module, level)| format!("{module}={level}"))
            .chain(self.extra.iter().cloned())
            .collect()
    }

    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()));
        self.directives()
            .iter()
            .filter_map(|directive| directive.parse().ok())
            .fold(base, EnvFilter::add_directive)
    }

    fn layer(&self) -> BoxedLayer {
        let writer = self.writer();
        let span_events = fmt_span(&self.config.span_events);
        let location = self.config.file_location;

        match self.config.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_span_events(span_events)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_thread_ids(self.config.thread_ids)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            LogFormat::Full => fmt::layer()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_thread_ids(self.config.thread_ids)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_thread_ids(self.config.thread_ids)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
        }
    }

    fn writer(&self) -> BoxMakeWriter {
        match (self.config.output, self.config.file_path.as_deref()) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                BoxMakeWriter::new(file_appender(path, self.config.rotation))
            }
            // Nothing is installed yet, so this goes to stderr directly.
            (LogOutput::File, None) => {
                eprintln!("picabot: file logging requested without a path, using stdout");
                BoxMakeWriter::new(std::io::stdout)
            }
        }
    }
}

fn file_appender(path: &Path, rotation: LogRotation) -> rolling::RollingFileAppender {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file = path
        .file_name()
        .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
    match rotation {
        LogRotation::Never => rolling::never(dir, file),
        LogRotation::Daily => rolling::daily(dir, file),
        LogRotation::Hourly => rolling::hourly(dir, file),
    }
}

fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_directives_are_sorted_then_extra() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            ..Default::default()
        };
        config
            .filters
            .insert("picabot_transport".into(), LogLevel::Trace);
        config.filters.insert("picabot_framework".into(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config).directive("tokio=off");
        assert_eq!(
            builder.directives(),
            vec![
                "picabot_framework=warn",
                "picabot_transport=trace",
                "tokio=off"
            ]
        );
    }

    #[test]
    fn test_span_event_flags() {
        assert_eq!(fmt_span(&SpanEventConfig::default()), FmtSpan::NONE);

        let lifecycle = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(fmt_span(&lifecycle), FmtSpan::NEW | FmtSpan::CLOSE);

        let all = SpanEventConfig {
            new: true,
            enter: true,
            exit: true,
            close: true,
        };
        assert_eq!(fmt_span(&all), FmtSpan::FULL);
    }

    #[test]
    fn test_file_appender_writes_under_parent_dir() {
        let dir = std::env::temp_dir().join(format!("picabot-log-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut appender = file_appender(&dir.join("bot.log"), LogRotation::Never);
        std::io::Write::write_all(&mut appender, b"hello\n").unwrap();
        std::io::Write::flush(&mut appender).unwrap();

        let written = std::fs::read_to_string(dir.join("bot.log")).unwrap();
        assert_eq!(written, "hello\n");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
