//! Inbound frame classification and dispatch.
//!
//! ```text
//! bytes ──► serde_json::Value
//!             │
//!             ├── object with "type"  ──► tagged InboundFrame
//!             ├── array               ──► legacy roster snapshot
//!             ├── object              ──► legacy chat message
//!             └── anything else       ──► ProtocolError::Malformed
//!                       │
//!                       ▼
//!              FrameHandler::on_*()
//! ```
//!
//! The explicit `type` discriminant always wins; shape-based detection only
//! exists for backends that still send bare arrays and message objects.

use serde_json::Value;

use crate::protocol::{ChatMessage, Identity, InboundFrame, PresenceEntry, ProtocolError, INBOUND_TAGS};

/// How a frame was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Carried an explicit `type` field.
    Tagged,
    /// Classified by JSON shape.
    Legacy,
}

/// Which handler a frame was dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Roster,
    Message,
    Join,
    Leave,
}

impl FrameKind {
    pub fn of(frame: &InboundFrame) -> Self {
        match frame {
            InboundFrame::Roster { .. } => FrameKind::Roster,
            InboundFrame::Message(_) => FrameKind::Message,
            InboundFrame::Join { .. } => FrameKind::Join,
            InboundFrame::Leave { .. } => FrameKind::Leave,
        }
    }
}

/// Receives routed frames.
pub trait FrameHandler {
    fn on_roster(&mut self, entries: Vec<PresenceEntry>);

    fn on_message(&mut self, message: ChatMessage);

    fn on_join(&mut self, _entry: PresenceEntry) {}

    fn on_leave(&mut self, _identity: Identity) {}
}

/// Routing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub tagged: u64,
    pub legacy: u64,
    pub rejected: u64,
}

/// Classifies inbound payloads and hands them to a [`FrameHandler`].
#[derive(Debug, Default)]
pub struct MessageRouter {
    stats: RouterStats,
}

impl MessageRouter {
    /// Create a router with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a payload without dispatching it.
    pub fn classify(payload: &[u8]) -> Result<(InboundFrame, WireFormat), ProtocolError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        match value {
            Value::Object(ref map) if map.contains_key("type") => {
                let tag = match map.get("type") {
                    Some(Value::String(tag)) => tag.clone(),
                    Some(other) => return Err(ProtocolError::UnknownFrameType(other.to_string())),
                    None => String::new(),
                };
                if !INBOUND_TAGS.contains(&tag.as_str()) {
                    return Err(ProtocolError::UnknownFrameType(tag));
                }
                let frame = serde_json::from_value(value)
                    .map_err(|e| ProtocolError::Malformed(format!("{tag}: {e}")))?;
                Ok((frame, WireFormat::Tagged))
            }
            Value::Array(_) => {
                let users = serde_json::from_value(value)
                    .map_err(|e| ProtocolError::Malformed(format!("roster: {e}")))?;
                Ok((InboundFrame::Roster { users }, WireFormat::Legacy))
            }
            Value::Object(_) => {
                let message = serde_json::from_value(value)
                    .map_err(|e| ProtocolError::Malformed(format!("message: {e}")))?;
                Ok((InboundFrame::Message(message), WireFormat::Legacy))
            }
            other => Err(ProtocolError::Malformed(format!(
                "expected object or array, got {other}"
            ))),
        }
    }

    /// Classify `payload` and call the matching handler method.
    ///
    /// Rejected frames reach no handler and are only counted.
    pub fn dispatch<H: FrameHandler>(
        &mut self,
        payload: &[u8],
        handler: &mut H,
    ) -> Result<FrameKind, ProtocolError> {
        let (frame, format) = match Self::classify(payload) {
            Ok(classified) => classified,
            Err(e) => {
                self.stats.rejected += 1;
                return Err(e);
            }
        };

        match format {
            WireFormat::Tagged => self.stats.tagged += 1,
            WireFormat::Legacy => self.stats.legacy += 1,
        }

        let kind = FrameKind::of(&frame);
        match frame {
            InboundFrame::Roster { users } => handler.on_roster(users),
            InboundFrame::Message(message) => handler.on_message(message),
            InboundFrame::Join { user } => handler.on_join(user),
            InboundFrame::Leave { user } => handler.on_leave(user.name),
        }
        Ok(kind)
    }

    /// Get the routing counters.
    pub fn stats(&self) -> RouterStats {
        self.stats
    }
}
