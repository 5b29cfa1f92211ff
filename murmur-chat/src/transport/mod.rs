//! Bidirectional frame channel between the session and the backend.
//!
//! Architecture:
//! ```text
//!                 Connection::send()           writer task
//! ┌─────────┐  ───────────────────────►  mpsc  ──────────► socket
//! │ Session │
//! └─────────┘  ◄───────────────────────  mpsc  ◄────────── socket
//!               TransportEvent::{Frame, Closed}  reader task
//! ```
//!
//! A transport opens a [`Connection`] and reports everything it receives on
//! the event channel handed to [`Transport::connect`]. Events from a single
//! connection arrive in order; each carries the [`ConnectionId`] it came
//! from so late events of a superseded connection can be told apart.

pub mod memory;
pub mod ws;

pub use memory::{MemoryLink, MemoryTransport};
pub use ws::WsTransport;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::ProtocolError;

/// Process-unique id of one opened connection.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the channel (close frame or end of stream).
    Remote { code: Option<u16>, reason: String },
    /// The channel failed.
    Error(String),
}

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame {
        connection: ConnectionId,
        payload: Vec<u8>,
    },
    Closed {
        connection: ConnectionId,
        reason: CloseReason,
    },
}

impl TransportEvent {
    /// The connection this event belongs to.
    pub fn connection(&self) -> ConnectionId {
        match self {
            TransportEvent::Frame { connection, .. } => *connection,
            TransportEvent::Closed { connection, .. } => *connection,
        }
    }
}

/// Item queued for a connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Frame(Vec<u8>),
    Close,
}

/// Handle to an open connection.
///
/// Cheap to hold; dropping it stops the writer once queued frames drain.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outgoing: mpsc::Sender<Outgoing>,
}

impl Connection {
    /// Allocate a connection handle and the receiver its writer drains.
    pub fn open(capacity: usize) -> (Self, mpsc::Receiver<Outgoing>) {
        let (outgoing, rx) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: next_connection_id(),
            outgoing,
        };
        (connection, rx)
    }

    /// Get the connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the writer side is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.outgoing.is_closed()
    }

    /// Queue a frame without waiting. Not acknowledged and not retried.
    ///
    /// A writer that has fallen behind by the full buffer reports
    /// [`SendError::Full`]; the frame is dropped.
    pub fn send(&self, payload: Vec<u8>) -> Result<(), SendError> {
        self.outgoing
            .try_send(Outgoing::Frame(payload))
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Full,
                TrySendError::Closed(_) => SendError::NotOpen,
            })
    }

    /// Ask the writer to close the channel. Best-effort and idempotent.
    ///
    /// Never waits. If the request cannot be queued, dropping the handle
    /// still ends the writer once it drains.
    pub fn close(&self) {
        if let Err(e) = self.outgoing.try_send(Outgoing::Close) {
            let why = match e {
                TrySendError::Full(_) => "buffer full",
                TrySendError::Closed(_) => "already closed",
            };
            log::debug!("Connection {} close request not queued: {why}", self.id);
        }
    }
}

/// Opens connections.
pub trait Transport {
    /// Open a connection to `url`, reporting its frames and closure on `events`.
    fn connect(
        &self,
        url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> impl Future<Output = Result<Connection, ConnectError>> + Send;
}

/// Connection could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Cannot reach {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection refused")]
    Refused,
}

/// Frame could not be queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Connection is not open")]
    NotOpen,
    #[error("Outgoing buffer is full")]
    Full,
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
