//! JSON wire protocol and data model for the chat backend.
//!
//! Outbound frames (client → server):
//! ```text
//! {"type":"send","text":"hi","name":"Alice","date":1718000000000}
//! {"type":"exit","user":{"name":"Alice"}}
//! ```
//!
//! Inbound frames (server → client) carry a `type` discriminant:
//! ```text
//! {"type":"roster","users":[{"id":"…","name":"Alice"}]}
//! {"type":"message","name":"Bob","text":"hey","date":1718000000000}
//! {"type":"join","user":{"id":"…","name":"Carol"}}
//! {"type":"leave","user":{"name":"Carol"}}
//! ```
//!
//! The legacy backend sends untagged frames (a bare roster array or a bare
//! message object) and echoes `send`/`exit` frames verbatim. Shape-based
//! classification of those lives in [`crate::router`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Milliseconds since the Unix epoch, as the backend expects in `date`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// User-chosen display name. Doubles as the session key on the backend.
///
/// Decoding applies the same rules as [`Identity::parse`], so a name read
/// off the wire is always trimmed and never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Build an identity from user input.
    ///
    /// Surrounding whitespace is trimmed; blank names are rejected.
    pub fn parse(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = ProtocolError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::parse(&name).ok_or_else(|| ProtocolError::Malformed("blank display name".into()))
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message as received from the backend. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "name")]
    pub sender: Identity,
    pub text: String,
    /// Sender-side timestamp (ms). Display only; ordering is receipt order.
    #[serde(rename = "date", default)]
    pub timestamp: i64,
}

impl ChatMessage {
    /// Create a message from `sender` stamped at `timestamp` (ms).
    pub fn new(sender: Identity, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp,
        }
    }

    /// Whether `identity` wrote this message.
    pub fn is_from(&self, identity: &Identity) -> bool {
        &self.sender == identity
    }
}

/// One connected participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    #[serde(rename = "name")]
    pub identity: Identity,
    /// Server-assigned connection id. Arrives as a string or a number.
    #[serde(rename = "id", deserialize_with = "string_or_number")]
    pub connection_id: String,
}

impl PresenceEntry {
    /// Create a roster entry.
    pub fn new(identity: Identity, connection_id: impl Into<String>) -> Self {
        Self {
            identity,
            connection_id: connection_id.into(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Reference to a user by name only (exit/leave frames carry no id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub name: Identity,
}

/// Tagged inbound frame.
///
/// `send` and `exit` are accepted as aliases because the legacy backend
/// rebroadcasts client frames unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Full roster replacement.
    #[serde(alias = "users")]
    Roster { users: Vec<PresenceEntry> },
    /// A chat message.
    #[serde(alias = "send")]
    Message(ChatMessage),
    /// A participant connected.
    Join { user: PresenceEntry },
    /// A participant left.
    #[serde(alias = "exit")]
    Leave { user: UserRef },
}

/// Tags [`InboundFrame`] understands, aliases included.
pub const INBOUND_TAGS: &[&str] = &["roster", "users", "message", "send", "join", "leave", "exit"];

impl InboundFrame {
    /// Serialize to the tagged JSON form.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    Send {
        text: String,
        name: Identity,
        date: i64,
    },
    Exit {
        user: UserRef,
    },
}

impl OutboundFrame {
    /// Create a chat message frame.
    pub fn send(identity: Identity, text: impl Into<String>, date: i64) -> Self {
        Self::Send {
            text: text.into(),
            name: identity,
            date,
        }
    }

    /// Create an exit announcement.
    pub fn exit(identity: Identity) -> Self {
        Self::Exit {
            user: UserRef { name: identity },
        }
    }

    /// Serialize to JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse a client frame (server side and tests).
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),
    #[error("Unknown frame type: {0}")]
    UnknownFrameType(String),
    #[error("Encode error: {0}")]
    Encode(String),
}
