//! The inbound chat message value type.

use std::fmt;

use serde_json::Value;
use time::OffsetDateTime;

/// A chat message received from the channel.
///
/// Immutable once constructed. The state machine creates one per chat part of
/// an inbound frame and hands it to the dispatcher, which shares it with the
/// handlers of a single dispatch cycle behind an `Arc`.
#[derive(Clone, PartialEq)]
pub struct Message {
    sender_name: String,
    text: String,
    received_at: OffsetDateTime,
    raw: Value,
}

impl Message {
    /// Creates a message received now, with an empty raw payload.
    pub fn new(sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            text: text.into(),
            received_at: OffsetDateTime::now_utc(),
            raw: Value::Null,
        }
    }

    /// Attaches the raw wire payload this message was parsed from.
    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    /// Overrides the receive timestamp.
    pub fn with_received_at(mut self, received_at: OffsetDateTime) -> Self {
        self.received_at = received_at;
        self
    }

    /// Display name of the sender.
    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    /// The message text, unmodified.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the frame carrying this message was parsed.
    pub fn received_at(&self) -> OffsetDateTime {
        self.received_at
    }

    /// The JSON object of the chat part, as sent by the server.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("sender_name", &self.sender_name)
            .field("text", &self.text)
            .field("received_at", &self.received_at)
            .finish_non_exhaustive()
    }
}
