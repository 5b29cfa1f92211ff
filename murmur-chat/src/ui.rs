//! Rendering boundary.
//!
//! The session never draws anything itself; it calls a [`UiAdapter`]
//! injected at construction. Only the four core hooks are required.

use crate::protocol::{ChatMessage, Identity, PresenceEntry};
use crate::session::SessionState;

/// Label shown in place of the local user's name.
pub const SELF_LABEL: &str = "You";

/// Receives render callbacks from a [`crate::session::Session`].
pub trait UiAdapter {
    /// Replace the displayed roster.
    fn render_roster(&mut self, roster: &[RosterView]);

    /// Append a message to the conversation.
    fn render_message(&mut self, message: &MessageView);

    /// Registration failed; tell the user to pick another name.
    fn render_warning(&mut self);

    /// Enable or disable message input.
    fn set_send_enabled(&mut self, enabled: bool);

    /// Ask for a display name.
    fn show_login(&mut self) {}

    fn hide_login(&mut self) {}

    fn hide_warning(&mut self) {}

    /// First frame arrived after connecting.
    fn render_ready(&mut self) {}

    fn state_changed(&mut self, _state: SessionState) {}
}

/// One roster row, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterView {
    pub connection_id: String,
    pub label: String,
    pub is_self: bool,
}

impl RosterView {
    pub fn new(entry: &PresenceEntry, me: Option<&Identity>) -> Self {
        let is_self = me == Some(&entry.identity);
        Self {
            connection_id: entry.connection_id.clone(),
            label: if is_self {
                SELF_LABEL.to_owned()
            } else {
                entry.identity.to_string()
            },
            is_self,
        }
    }
}

/// One message, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub author: String,
    pub text: String,
    pub timestamp: i64,
    pub is_own: bool,
}

impl MessageView {
    pub fn new(message: &ChatMessage, me: Option<&Identity>) -> Self {
        let is_own = me.is_some_and(|me| message.is_from(me));
        Self {
            author: if is_own {
                SELF_LABEL.to_owned()
            } else {
                message.sender.to_string()
            },
            text: message.text.clone(),
            timestamp: message.timestamp,
            is_own,
        }
    }
}
