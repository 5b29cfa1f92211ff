//! In-process loopback transport.
//!
//! Every successful [`MemoryTransport::connect`] parks a [`MemoryLink`] that
//! plays the server side: it injects inbound frames, reads what the client
//! wrote, and can close the connection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{CloseReason, ConnectError, Connection, ConnectionId, Outgoing, Transport, TransportEvent};

/// Loopback transport for tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    links: Arc<Mutex<VecDeque<MemoryLink>>>,
    refuse: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every connect attempt fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Take the server side of the oldest unclaimed connection.
    pub fn take_link(&self) -> Option<MemoryLink> {
        self.links.lock().ok()?.pop_front()
    }
}

impl Transport for MemoryTransport {
    async fn connect(
        &self,
        url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Connection, ConnectError> {
        if self.refuse {
            return Err(ConnectError::Refused);
        }
        let (connection, outgoing) = Connection::open(64);
        let link = MemoryLink {
            id: connection.id(),
            url: url.to_owned(),
            events,
            outgoing,
        };
        self.links
            .lock()
            .map_err(|_| ConnectError::Refused)?
            .push_back(link);
        Ok(connection)
    }
}

/// Server side of a loopback connection.
#[derive(Debug)]
pub struct MemoryLink {
    id: ConnectionId,
    url: String,
    events: mpsc::Sender<TransportEvent>,
    outgoing: mpsc::Receiver<Outgoing>,
}

impl MemoryLink {
    /// Id of the client-side connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// URL the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a frame to the client.
    pub async fn deliver(&self, payload: impl Into<Vec<u8>>) {
        let _ = self
            .events
            .send(TransportEvent::Frame {
                connection: self.id,
                payload: payload.into(),
            })
            .await;
    }

    /// Deliver a JSON value as a frame.
    pub async fn deliver_json(&self, value: &serde_json::Value) {
        self.deliver(value.to_string()).await;
    }

    /// Report the connection as closed by the server.
    pub async fn close(&self, reason: CloseReason) {
        let _ = self
            .events
            .send(TransportEvent::Closed {
                connection: self.id,
                reason,
            })
            .await;
    }

    /// Drain everything the client has written so far.
    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        let mut drained = Vec::new();
        while let Ok(item) = self.outgoing.try_recv() {
            drained.push(item);
        }
        drained
    }

    /// Drain written frames, skipping close requests.
    pub fn drain_frames(&mut self) -> Vec<Vec<u8>> {
        self.drain_outgoing()
            .into_iter()
            .filter_map(|item| match item {
                Outgoing::Frame(payload) => Some(payload),
                Outgoing::Close => None,
            })
            .collect()
    }

    /// Drop the client's writer half, so further sends fail with `NotOpen`.
    pub fn sever(&mut self) {
        self.outgoing.close();
    }
}
