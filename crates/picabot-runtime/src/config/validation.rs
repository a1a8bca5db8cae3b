//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, ConnectionConfig, LogOutput, LoggingConfig, PicabotConfig, ServerConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &PicabotConfig) -> ConfigResult<()> {
    validate_server_config(&config.server)?;
    validate_bot_config(&config.bot)?;
    validate_connection_config(&config.connection)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.trim().is_empty() {
        return Err(ConfigError::validation("server.host cannot be empty"));
    }
    if server.host.contains("://") {
        return Err(ConfigError::validation(format!(
            "server.host must not include a scheme: {}",
            server.host
        )));
    }
    if !server.path.starts_with('/') {
        return Err(ConfigError::validation(format!(
            "server.path must start with '/': {}",
            server.path
        )));
    }
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.command_prefix.is_empty() {
        return Err(ConfigError::validation("bot.command_prefix cannot be empty"));
    }
    if bot.command_prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "bot.command_prefix cannot contain whitespace",
        ));
    }
    if bot.channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ConfigError::validation("bot.channel cannot be blank"));
    }
    Ok(())
}

fn validate_connection_config(connection: &ConnectionConfig) -> ConfigResult<()> {
    if connection.base_delay_ms == 0 {
        return Err(ConfigError::validation(
            "connection.base_delay_ms must be greater than 0",
        ));
    }
    if connection.max_delay_ms < connection.base_delay_ms {
        return Err(ConfigError::validation(
            "connection.max_delay_ms must be greater than or equal to base_delay_ms",
        ));
    }
    if !(0.0..1.0).contains(&connection.jitter) {
        return Err(ConfigError::validation(format!(
            "connection.jitter must be in [0, 1): {}",
            connection.jitter
        )));
    }
    if connection.auth_timeout_ms == 0 || connection.connect_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "connection timeouts must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when output = \"file\"",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&PicabotConfig::default()).is_ok());
    }

    #[test]
    fn test_server_checks() {
        let mut config = PicabotConfig::default();
        config.server.host = "wss://chat.picarto.tv".into();
        assert!(validate_config(&config).is_err());

        let mut config = PicabotConfig::default();
        config.server.path = "chat".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_prefix_checks() {
        let mut config = PicabotConfig::default();
        config.bot.command_prefix = " ".into();
        assert!(validate_config(&config).is_err());

        config.bot.command_prefix = ">>".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_backoff_checks() {
        let mut config = PicabotConfig::default();
        config.connection.max_delay_ms = 10;
        assert!(validate_config(&config).is_err());

        let mut config = PicabotConfig::default();
        config.connection.jitter = 1.0;
        assert!(validate_config(&config).is_err());

        let mut config = PicabotConfig::default();
        config.connection.base_delay_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = PicabotConfig::default();
        config.logging.output = LogOutput::File;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("file_path"));

        config.logging.file_path = Some("picabot.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
