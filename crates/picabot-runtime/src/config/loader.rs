//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `picabot.toml` / `config.toml`
//! - `yaml-config`: enables `picabot.yaml` / `picabot.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides passed to [`ConfigLoader::merge`]
//! 3. Profile-specific config file (`picabot.{profile}.toml`)
//! 4. Main config file (`picabot.toml`)
//! 5. Environment variables (`PICABOT_*`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `PICABOT_` prefix with `__` as the section separator:
//!
//! - `PICABOT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `PICABOT_CONNECTION__MAX_RETRIES=5` → `connection.max_retries = 5`
//! - `PICABOT_BOT__COMMAND_PREFIX=?` → `bot.command_prefix = "?"`
//!
//! `PICABOT_PROFILE` selects the profile and is not a configuration key.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./picabot.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::PicabotConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "PICABOT_";
const PROFILE_VAR: &str = "PICABOT_PROFILE";
const APP_DIR: &str = "picabot";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as aliases.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `PICABOT_PROFILE`, defaulting to `Development`.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides.
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (skips the search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader for the profile named by `PICABOT_PROFILE`.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/picabot` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join(APP_DIR)),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables `PICABOT_*` environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a programmatic configuration over the defaults.
    pub fn merge(mut self, config: PicabotConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<PicabotConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: PicabotConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            endpoint = %config.server.to_endpoint(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(PicabotConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        if let Some(path) = self.config_file.as_deref() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        Ok(figment)
    }

    /// Merges one file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR));
        }
        paths
    }

    /// Walks `search_paths × base_names`. The profile variant of a name is
    /// merged first, then the base file; the first base file found wins.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        #[allow(unused_mut)]
        let mut figment = figment;
        #[allow(unused_mut)]
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["picabot.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["picabot.yaml", "picabot.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<PicabotConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<PicabotConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::{LogLevel, LoggingConfig};
    use picabot_framework::{ArgSplit, DispatchMode};

    fn load_in(jail: &Jail) -> figment::error::Result<PicabotConfig> {
        ConfigLoader::new()
            .search_path(jail.directory())
            .load()
            .map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = load_in(jail)?;
            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.bot.command_prefix, "!");
            assert_eq!(config.connection.max_retries, None);
            Ok(())
        });
    }

    #[test]
    fn test_file_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "picabot.toml",
                r#"
                    [server]
                    host = "localhost:9000"
                    secure = false

                    [bot]
                    channel = "studio"
                    command_prefix = "?"
                    arg_split = "quoted"

                    [connection]
                    base_delay_ms = 250
                    max_retries = 5

                    [dispatch]
                    mode = "inline"

                    [logging.filters]
                    picabot_runtime = "trace"
                "#,
            )?;

            let config = load_in(jail)?;
            assert_eq!(config.server.to_endpoint().url(), "ws://localhost:9000/chat");
            assert_eq!(config.bot.channel.as_deref(), Some("studio"));
            assert_eq!(config.bot.command_prefix, "?");
            assert_eq!(config.bot.arg_split, ArgSplit::Quoted);
            assert_eq!(config.connection.base_delay_ms, 250);
            assert_eq!(config.connection.max_delay_ms, 60_000);
            assert_eq!(config.connection.max_retries, Some(5));
            assert_eq!(config.dispatch.mode, DispatchMode::Inline);
            assert_eq!(
                config.logging.filters.get("picabot_runtime"),
                Some(&LogLevel::Trace)
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "picabot.toml",
                r#"
                    [connection]
                    max_retries = 5
                    [logging]
                    level = "warn"
                "#,
            )?;
            jail.set_env("PICABOT_CONNECTION__MAX_RETRIES", "7");
            jail.set_env("PICABOT_BOT__COMMAND_PREFIX", "$");

            let config = load_in(jail)?;
            assert_eq!(config.connection.max_retries, Some(7));
            assert_eq!(config.bot.command_prefix, "$");
            assert_eq!(config.logging.level, LogLevel::Warn);
            Ok(())
        });
    }

    #[test]
    fn test_without_env_ignores_variables() {
        Jail::expect_with(|jail| {
            jail.set_env("PICABOT_LOGGING__LEVEL", "debug");
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Info);
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_overridden_by_main_file() {
        Jail::expect_with(|jail| {
            jail.set_env("PICABOT_PROFILE", "prod");
            jail.create_file(
                "picabot.production.toml",
                r##"
                    [logging]
                    level = "error"
                    [bot]
                    command_prefix = "#"
                "##,
            )?;
            jail.create_file(
                "picabot.toml",
                r#"
                    [bot]
                    command_prefix = "?"
                "#,
            )?;

            let config = load_in(jail)?;
            assert_eq!(config.logging.level, LogLevel::Error);
            assert_eq!(config.bot.command_prefix, "?");
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_merge() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(PicabotConfig {
                    logging: LoggingConfig {
                        level: LogLevel::Debug,
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|jail| {
            let err = ConfigLoader::new()
                .file(jail.directory().join("nope.toml"))
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("picabot.ini", "level = debug")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("picabot.ini"))
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "picabot.toml",
                r#"
                    [logging]
                    level = "loud"
                "#,
            )?;
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::Extract(_)));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "picabot.toml",
                r#"
                    [bot]
                    command_prefix = ""
                "#,
            )?;
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
