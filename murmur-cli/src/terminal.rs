//! Line-oriented terminal front-end for a chat session.

use std::fmt;
use std::io::Write;

use chrono::{DateTime, Local, TimeZone};
use murmur_chat::{MessageView, RosterView, SessionState, UiAdapter};

/// `UiAdapter` that prints to any writer, one event per line.
pub struct TerminalUi<W> {
    out: W,
    send_enabled: bool,
}

impl<W: Write> TerminalUi<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            send_enabled: false,
        }
    }

    /// Whether typed lines should be sent as messages.
    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Print a free-form notice.
    pub fn notice(&mut self, text: &str) {
        self.line(format_args!("* {text}"));
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{args}") {
            log::warn!("Terminal write failed: {e}");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> UiAdapter for TerminalUi<W> {
    fn render_roster(&mut self, roster: &[RosterView]) {
        let names: Vec<&str> = roster.iter().map(|row| row.label.as_str()).collect();
        self.line(format_args!("Online ({}): {}", names.len(), names.join(", ")));
    }

    fn render_message(&mut self, message: &MessageView) {
        let when = format_timestamp(message.timestamp, &Local);
        self.line(format_args!("[{}, {when}] {}", message.author, message.text));
    }

    fn render_warning(&mut self) {
        self.line(format_args!("! That nickname is unavailable, choose another one."));
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
    }

    fn show_login(&mut self) {
        self.line(format_args!("Choose a nickname:"));
    }

    fn render_ready(&mut self) {
        self.line(format_args!("Connected. Type a message, /leave to exit the chat."));
    }

    fn state_changed(&mut self, state: SessionState) {
        if state == SessionState::Connecting {
            self.line(format_args!("Connecting..."));
        }
    }
}

/// `HH:MM dd.mm.yyyy` in the given zone; empty for out-of-range stamps.
pub fn format_timestamp<Tz>(millis: i64, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(zone).format("%H:%M %d.%m.%Y").to_string())
        .unwrap_or_default()
}
