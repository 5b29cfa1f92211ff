//! One user's participation in the chat.
//!
//! ```text
//!              submit_identity()          registration ok         socket open
//! Disconnected ────────────────► Authenticating ──────────► Connecting ──────────► Connected
//!      ▲                              │                          │                    │
//!      │         rejected / invalid   │   connect failed         │      close() /     │
//!      ├──────────────────────────────┘◄─────────────────────────┘   transport closed │
//!      └──────────────────────────────────────── Closing ◄────────────────────────────┘
//! ```
//!
//! The session is owned by a single task. Transport frames arrive on the
//! event channel from [`Session::take_event_rx`] and are fed back in with
//! [`Session::handle_event`], one at a time.

use std::collections::VecDeque;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ChatConfig;
use crate::presence::PresenceRegistry;
use crate::protocol::{now_millis, ChatMessage, Identity, OutboundFrame, PresenceEntry};
use crate::registration::{Registrar, RegistrationError};
use crate::router::{FrameHandler, MessageRouter, RouterStats};
use crate::transport::{ConnectError, Connection, SendError, Transport, TransportEvent};
use crate::ui::{MessageView, UiAdapter};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Closing,
}

/// Errors surfaced by [`Session::submit_identity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("Session already active ({0:?})")]
    AlreadyActive(SessionState),
}

/// Chat session: identity, connection, roster and message history.
pub struct Session<T, R, U> {
    config: ChatConfig,
    transport: T,
    registrar: R,
    ui: U,

    /// Current lifecycle state
    state: SessionState,
    /// Registered identity (Some only between registration and teardown)
    identity: Option<Identity>,
    /// Open connection (Some only while Connected or Closing)
    connection: Option<Connection>,

    router: MessageRouter,
    registry: PresenceRegistry,
    /// Received messages in receipt order
    history: VecDeque<ChatMessage>,
    /// At least one frame routed since connecting
    loaded: bool,

    event_tx: mpsc::Sender<TransportEvent>,
    event_rx: Option<mpsc::Receiver<TransportEvent>>,
}

impl<T, R, U> Session<T, R, U>
where
    T: Transport,
    R: Registrar,
    U: UiAdapter,
{
    /// Create a disconnected session.
    pub fn new(config: ChatConfig, transport: T, registrar: R, ui: U) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        Self {
            config,
            transport,
            registrar,
            ui,
            state: SessionState::Disconnected,
            identity: None,
            connection: None,
            router: MessageRouter::new(),
            registry: PresenceRegistry::new(),
            history: VecDeque::new(),
            loaded: false,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the transport event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.event_rx.take()
    }

    /// Put the UI in its initial state: login prompt shown, sending disabled.
    pub fn init(&mut self) {
        self.ui.set_send_enabled(false);
        self.ui.show_login();
    }

    /// Register `name` and open the chat connection.
    ///
    /// A refused or invalid name renders exactly one warning and re-shows the
    /// login prompt. A failed connect is only logged. Either way the session
    /// ends up Disconnected and accepts another attempt.
    pub async fn submit_identity(&mut self, name: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::AlreadyActive(self.state));
        }

        self.ui.hide_warning();
        self.ui.hide_login();

        let identity = match Identity::parse(name) {
            Some(identity) => identity,
            None => {
                self.reject_identity(RegistrationError::InvalidName);
                return Err(RegistrationError::InvalidName.into());
            }
        };

        self.transition(SessionState::Authenticating);
        if let Err(e) = self.registrar.register(&identity).await {
            self.reject_identity(e.clone());
            return Err(e.into());
        }

        self.transition(SessionState::Connecting);
        self.ui.set_send_enabled(false);

        let connect = self
            .transport
            .connect(&self.config.ws_url, self.event_tx.clone());
        let result = match self.config.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => Err(ConnectError::Timeout(limit)),
            },
            None => connect.await,
        };

        match result {
            Ok(connection) => {
                log::info!("{identity} joined via connection {}", connection.id());
                self.identity = Some(identity);
                self.connection = Some(connection);
                self.loaded = false;
                self.transition(SessionState::Connected);
                Ok(())
            }
            Err(e) => {
                log::warn!("Could not connect to {}: {e}", self.config.ws_url);
                self.transition(SessionState::Disconnected);
                self.ui.show_login();
                Err(e.into())
            }
        }
    }

    fn reject_identity(&mut self, error: RegistrationError) {
        log::warn!("Registration failed: {error}");
        self.transition(SessionState::Disconnected);
        self.ui.render_warning();
        self.ui.show_login();
    }

    /// Apply one transport event.
    ///
    /// Events from anything but the current connection are dropped.
    pub fn handle_event(&mut self, event: TransportEvent) {
        let current = self.connection.as_ref().map(Connection::id);
        if current != Some(event.connection()) {
            log::debug!("Dropping event from stale connection {}", event.connection());
            return;
        }

        match event {
            TransportEvent::Frame { payload, .. } => self.handle_frame(&payload),
            TransportEvent::Closed { reason, .. } => {
                log::info!("Connection closed by transport: {reason:?}");
                self.connection = None;
                self.teardown();
            }
        }
    }

    fn handle_frame(&mut self, payload: &[u8]) {
        if self.state != SessionState::Connected {
            return;
        }

        let mut inbox = Inbox {
            identity: self.identity.as_ref(),
            registry: &mut self.registry,
            history: &mut self.history,
            history_limit: self.config.history_limit,
            ui: &mut self.ui,
        };
        match self.router.dispatch(payload, &mut inbox) {
            Ok(kind) => {
                log::debug!("Routed {kind:?} frame");
                if !self.loaded {
                    self.loaded = true;
                    self.ui.set_send_enabled(true);
                    self.ui.render_ready();
                }
            }
            Err(e) => log::warn!("Discarding inbound frame: {e}"),
        }
    }

    /// Send a chat message.
    ///
    /// Returns `Ok(false)` without touching the transport when not Connected
    /// or when `text` is blank. Never waits on the transport: a backed-up
    /// connection fails with [`SendError::Full`].
    pub fn send_message(&mut self, text: &str) -> Result<bool, SendError> {
        if self.state != SessionState::Connected || text.trim().is_empty() {
            return Ok(false);
        }
        let (Some(connection), Some(identity)) = (&self.connection, &self.identity) else {
            return Ok(false);
        };

        let payload = OutboundFrame::send(identity.clone(), text, now_millis()).encode()?;
        if let Err(e) = connection.send(payload) {
            log::warn!("Message from {identity} not sent: {e}");
            return Err(e);
        }
        Ok(true)
    }

    /// Leave the chat.
    ///
    /// Announces the exit (errors swallowed), closes the transport and always
    /// ends Disconnected, even when the transport has stopped draining.
    /// No-op when already Disconnected.
    pub fn close(&mut self) {
        if self.state == SessionState::Disconnected && self.connection.is_none() {
            return;
        }
        self.transition(SessionState::Closing);

        if let Some(connection) = self.connection.take() {
            if let Some(identity) = &self.identity {
                let sent = match OutboundFrame::exit(identity.clone()).encode() {
                    Ok(payload) => connection.send(payload),
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = sent {
                    log::debug!("Exit frame for {identity} not delivered: {e}");
                }
            }
            connection.close();
            log::info!("Closed connection {}", connection.id());
        }

        self.teardown();
    }

    /// Drop all connected-only state and return to Disconnected.
    fn teardown(&mut self) {
        self.identity = None;
        self.registry.clear();
        self.history.clear();
        self.loaded = false;
        self.ui.set_send_enabled(false);
        self.transition(SessionState::Disconnected);
        self.ui.show_login();
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::debug!("Session {:?} -> {next:?}", self.state);
            self.state = next;
            self.ui.state_changed(next);
        }
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the registered identity, if connected.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Get the current roster.
    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    /// Received messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter()
    }

    /// Whether a frame has been routed since connecting.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Get the inbound routing counters.
    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Get the UI adapter.
    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Get the UI adapter mutably.
    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }
}

/// Routed-frame sink borrowing the session's connected state.
struct Inbox<'a, U> {
    identity: Option<&'a Identity>,
    registry: &'a mut PresenceRegistry,
    history: &'a mut VecDeque<ChatMessage>,
    history_limit: usize,
    ui: &'a mut U,
}

impl<U: UiAdapter> Inbox<'_, U> {
    fn render_roster(&mut self) {
        let rows = self.registry.mark_self(self.identity);
        self.ui.render_roster(&rows);
    }
}

impl<U: UiAdapter> FrameHandler for Inbox<'_, U> {
    fn on_roster(&mut self, entries: Vec<PresenceEntry>) {
        self.registry.apply_roster_snapshot(entries);
        self.render_roster();
    }

    fn on_message(&mut self, message: ChatMessage) {
        self.ui.render_message(&MessageView::new(&message, self.identity));
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(message);
    }

    fn on_join(&mut self, entry: PresenceEntry) {
        self.registry.join(entry);
        self.render_roster();
    }

    fn on_leave(&mut self, identity: Identity) {
        if self.registry.leave(&identity).is_some() {
            self.render_roster();
        }
    }
}
