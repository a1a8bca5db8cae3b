//! Bot identity and server endpoint.

use std::fmt;

/// The secret half of the bot identity.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    /// A chat token issued for the bot.
    Token(String),
    /// The bot account password.
    Password(String),
}

impl Secret {
    /// Wire field name for this kind of secret.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Password(_) => "password",
        }
    }

    /// Exposes the secret value. Only the frame encoder should call this.
    pub fn expose(&self) -> &str {
        match self {
            Self::Token(s) | Self::Password(s) => s,
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(<redacted>)", self.field_name())
    }
}

/// Credentials used to authenticate the bot on one channel.
///
/// Supplied once at construction and read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: Secret,
    channel: String,
}

impl Credentials {
    /// Creates credentials with an arbitrary secret.
    pub fn new(username: impl Into<String>, secret: Secret, channel: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret,
            channel: channel.into(),
        }
    }

    /// Authenticates with a chat token.
    pub fn token(
        username: impl Into<String>,
        token: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self::new(username, Secret::Token(token.into()), channel)
    }

    /// Authenticates with the bot account password.
    pub fn password(
        username: impl Into<String>,
        password: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self::new(username, Secret::Password(password.into()), channel)
    }

    /// Login name of the bot.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret.
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Channel the bot joins.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &self.secret)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Where the chat server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name, optionally with a port.
    pub server: String,
    /// Request path, starting with `/`.
    pub path: String,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            server: "chat.picarto.tv".to_string(),
            path: "/chat".to_string(),
            secure: true,
        }
    }
}

impl Endpoint {
    /// Creates a secure endpoint for `server` with the default path.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
    }

    /// Sets the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Chooses between `wss://` and `ws://`.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Renders the WebSocket URL.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}{}", self.server, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
