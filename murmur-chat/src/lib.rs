//! # murmur-chat — real-time chat session client
//!
//! Registers a display name over HTTP, joins the chat over WebSocket, keeps
//! the roster and message history, and reports everything to a pluggable UI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  POST /new-user   ┌─────────────┐
//! │  Registrar  │ ─────────────────► │   Backend   │
//! └──────▲──────┘                    │             │
//!        │                           │             │
//! ┌──────┴──────┐    WebSocket/JSON  │             │
//! │   Session   │ ◄────────────────► │             │
//! │ (per user)  │     Transport      └─────────────┘
//! └──┬───────┬──┘
//!    │       │ frames
//!    │       ▼
//!    │  ┌─────────────┐  roster   ┌──────────────────┐
//!    │  │MessageRouter│ ────────► │ PresenceRegistry │
//!    │  └─────────────┘           └──────────────────┘
//!    ▼
//! ┌─────────────┐
//! │  UiAdapter  │  render_roster / render_message / render_warning / set_send_enabled
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — Data model and JSON wire frames
//! - [`transport`] — Transport trait, WebSocket and in-memory implementations
//! - [`registration`] — Identity registration over HTTP
//! - [`presence`] — Roster of connected users
//! - [`router`] — Inbound frame classification and dispatch
//! - [`session`] — Session state machine
//! - [`ui`] — Rendering boundary
//! - [`config`] — Client configuration

pub mod config;
pub mod presence;
pub mod protocol;
pub mod registration;
pub mod router;
pub mod session;
pub mod transport;
pub mod ui;

// Re-exports for convenience
pub use config::ChatConfig;
pub use presence::PresenceRegistry;
pub use protocol::{ChatMessage, Identity, InboundFrame, OutboundFrame, PresenceEntry, ProtocolError};
pub use registration::{HttpRegistrar, Registrar, RegistrationError};
pub use router::{FrameHandler, FrameKind, MessageRouter, RouterStats, WireFormat};
pub use session::{Session, SessionError, SessionState};
pub use transport::{
    CloseReason, ConnectError, Connection, ConnectionId, MemoryTransport, SendError, Transport,
    TransportEvent, WsTransport,
};
pub use ui::{MessageView, RosterView, UiAdapter};
