//! Wire frames exchanged with the chat server.
//!
//! Frames are JSON text. Inbound frames carry a `"t"` tag:
//!
//! ```text
//! {"t":"c","m":[{"n":"alice","m":"!hello"}]}     chat, one or more parts
//! {"t":"auth","ok":true}                           authentication ack
//! {"t":"auth","ok":false,"reason":"bad token"}     authentication reject
//! {"t":"p", ...}                                   presence / control (any other tag)
//! ```
//!
//! Outbound frames carry a `"type"` tag (`"auth"` or `"chat"`).
//!
//! [`parse_frame`] is total: every input yields either an [`InboundFrame`] or
//! a [`ParseError`].

use serde_json::{Map, Value, json};
use time::OffsetDateTime;

use crate::credentials::Credentials;
use crate::error::{ParseError, ParseResult};
use crate::message::Message;

/// Tag of chat frames.
pub const CHAT_TAG: &str = "c";
/// Tag of authentication result frames.
pub const AUTH_TAG: &str = "auth";

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Chat messages, in the order the server listed them.
    Chat(Vec<Message>),
    /// The server accepted our credentials.
    AuthAck,
    /// The server rejected our credentials.
    AuthReject {
        /// Reason given by the server.
        reason: String,
    },
    /// Presence, ping, user list and similar frames that are never dispatched.
    Control {
        /// The frame tag.
        kind: String,
    },
}

impl InboundFrame {
    /// Short name used in logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::Chat(_) => "chat",
            Self::AuthAck => "auth-ack",
            Self::AuthReject { .. } => "auth-reject",
            Self::Control { kind } => kind,
        }
    }
}

/// Parses one inbound frame.
///
/// Empty or whitespace-only payloads are keep-alives and parse as
/// `Control { kind: "empty" }`.
pub fn parse_frame(raw: &str) -> ParseResult<InboundFrame> {
    if raw.trim().is_empty() {
        return Ok(InboundFrame::Control {
            kind: "empty".to_string(),
        });
    }

    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(obj) = value else {
        return Err(ParseError::NotAnObject);
    };

    let tag = obj
        .get("t")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::missing("t"))?;

    match tag {
        CHAT_TAG => parse_chat(&obj),
        AUTH_TAG => parse_auth(&obj),
        other => Ok(InboundFrame::Control {
            kind: other.to_string(),
        }),
    }
}

fn parse_chat(obj: &Map<String, Value>) -> ParseResult<InboundFrame> {
    let parts = obj
        .get("m")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::missing("m"))?;

    let received_at = OffsetDateTime::now_utc();
    let mut messages = Vec::with_capacity(parts.len());

    for (i, part) in parts.iter().enumerate() {
        let sender = part
            .get("n")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::missing(format!("m[{i}].n")))?;
        let text = part
            .get("m")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::missing(format!("m[{i}].m")))?;

        messages.push(
            Message::new(sender, text)
                .with_raw(part.clone())
                .with_received_at(received_at),
        );
    }

    Ok(InboundFrame::Chat(messages))
}

fn parse_auth(obj: &Map<String, Value>) -> ParseResult<InboundFrame> {
    let ok = obj
        .get("ok")
        .and_then(Value::as_bool)
        .ok_or_else(|| ParseError::missing("ok"))?;

    if ok {
        Ok(InboundFrame::AuthAck)
    } else {
        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("no reason given")
            .to_string();
        Ok(InboundFrame::AuthReject { reason })
    }
}

/// A frame we send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Log in and join the channel.
    Authenticate(Credentials),
    /// Post a chat message.
    Chat(String),
}

impl OutboundFrame {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "auth",
            Self::Chat(_) => "chat",
        }
    }

    /// Encodes the frame as JSON text.
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Authenticate(creds) => {
                let mut obj = Map::new();
                obj.insert("type".into(), json!("auth"));
                obj.insert("username".into(), json!(creds.username()));
                obj.insert("channel".into(), json!(creds.channel()));
                obj.insert(
                    creds.secret().field_name().into(),
                    json!(creds.secret().expose()),
                );
                Value::Object(obj)
            }
            Self::Chat(text) => json!({ "type": "chat", "message": text }),
        };
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(frame: &InboundFrame) -> Vec<(&str, &str)> {
        match frame {
            InboundFrame::Chat(msgs) => msgs.iter().map(|m| (m.sender_name(), m.text())).collect(),
            other => panic!("expected chat frame, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_chat_frame() {
        let frame = parse_frame(r#"{"t":"c","m":[{"n":"alice","m":"!hello","c":"ff0000"}]}"#)
            .unwrap();
        assert_eq!(texts(&frame), vec![("alice", "!hello")]);

        let InboundFrame::Chat(msgs) = frame else {
            unreachable!()
        };
        assert_eq!(msgs[0].raw()["c"], "ff0000");
    }

    #[test]
    fn test_parse_chat_frame_keeps_part_order() {
        let frame = parse_frame(r#"{"t":"c","m":[{"n":"a","m":"1"},{"n":"b","m":"2"}]}"#).unwrap();
        assert_eq!(texts(&frame), vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_parse_auth_frames() {
        assert_eq!(
            parse_frame(r#"{"t":"auth","ok":true}"#).unwrap(),
            InboundFrame::AuthAck
        );
        assert_eq!(
            parse_frame(r#"{"t":"auth","ok":false,"reason":"bad token"}"#).unwrap(),
            InboundFrame::AuthReject {
                reason: "bad token".into()
            }
        );
        assert_eq!(
            parse_frame(r#"{"t":"auth","ok":false}"#).unwrap(),
            InboundFrame::AuthReject {
                reason: "no reason given".into()
            }
        );
    }

    #[test]
    fn test_parse_control_frames() {
        assert_eq!(
            parse_frame(r#"{"t":"p","n":"bob"}"#).unwrap(),
            InboundFrame::Control { kind: "p".into() }
        );
        assert_eq!(
            parse_frame("  ").unwrap(),
            InboundFrame::Control {
                kind: "empty".into()
            }
        );
    }

    #[test]
    fn test_parse_malformed_frames() {
        assert!(matches!(
            parse_frame("{not json"),
            Err(ParseError::InvalidJson { .. })
        ));
        assert_eq!(parse_frame("[1,2]"), Err(ParseError::NotAnObject));
        assert_eq!(parse_frame(r#"{"m":[]}"#), Err(ParseError::missing("t")));
        assert_eq!(parse_frame(r#"{"t":5}"#), Err(ParseError::missing("t")));
        assert_eq!(
            parse_frame(r#"{"t":"c","m":"hello"}"#),
            Err(ParseError::missing("m"))
        );
        assert_eq!(
            parse_frame(r#"{"t":"c","m":[{"n":"a","m":"ok"},{"m":"no sender"}]}"#),
            Err(ParseError::missing("m[1].n"))
        );
        assert_eq!(
            parse_frame(r#"{"t":"auth"}"#),
            Err(ParseError::missing("ok"))
        );
    }

    #[test]
    fn test_encode_chat() {
        let encoded = OutboundFrame::Chat("hi \"there\"".into()).encode();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({"type": "chat", "message": "hi \"there\""}));
    }

    #[test]
    fn test_encode_authenticate_uses_secret_kind() {
        let token = OutboundFrame::Authenticate(Credentials::token("bot", "abc", "chan")).encode();
        let value: Value = serde_json::from_str(&token).unwrap();
        assert_eq!(
            value,
            json!({"type": "auth", "username": "bot", "channel": "chan", "token": "abc"})
        );

        let password =
            OutboundFrame::Authenticate(Credentials::password("bot", "pw", "chan")).encode();
        let value: Value = serde_json::from_str(&password).unwrap();
        assert_eq!(value["password"], "pw");
        assert!(value.get("token").is_none());
    }

    #[test]
    fn test_outbound_debug_does_not_leak_secret() {
        let frame = OutboundFrame::Authenticate(Credentials::token("bot", "abc123", "chan"));
        assert!(!format!("{frame:?}").contains("abc123"));
    }
}
