//! WebSocket transport backed by tokio-tungstenite.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::{CloseReason, ConnectError, Connection, Outgoing, Transport, TransportEvent};

/// WebSocket client transport.
///
/// Spawns one writer and one reader task per connection.
#[derive(Debug, Clone)]
pub struct WsTransport {
    outgoing_capacity: usize,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

impl WsTransport {
    /// Create a transport whose connections buffer up to `outgoing_capacity` frames.
    pub fn new(outgoing_capacity: usize) -> Self {
        Self { outgoing_capacity }
    }
}

impl Transport for WsTransport {
    async fn connect(
        &self,
        url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Connection, ConnectError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ConnectError::Unreachable {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (connection, mut out_rx) = Connection::open(self.outgoing_capacity);
        let id = connection.id();

        // Writer task: forward queued frames to the socket. A close request
        // or a dropped handle both end in a close handshake.
        tokio::spawn(async move {
            while let Some(Outgoing::Frame(payload)) = out_rx.recv().await {
                let msg = match String::from_utf8(payload) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => Message::Binary(e.into_bytes().into()),
                };
                if let Err(e) = ws_writer.send(msg).await {
                    log::debug!("Connection {id} writer stopped: {e}");
                    return;
                }
            }
            if let Err(e) = ws_writer.close().await {
                log::debug!("Connection {id} close handshake failed: {e}");
            }
        });

        // Reader task: forward frames, then report closure exactly once
        tokio::spawn(async move {
            let reason = loop {
                match ws_reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let payload = text.as_str().as_bytes().to_vec();
                        if events
                            .send(TransportEvent::Frame { connection: id, payload })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let payload: Vec<u8> = data.into();
                        if events
                            .send(TransportEvent::Frame { connection: id, payload })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => CloseReason::Remote {
                                code: Some(u16::from(frame.code)),
                                reason: frame.reason.as_str().to_owned(),
                            },
                            None => CloseReason::Remote {
                                code: None,
                                reason: String::new(),
                            },
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break CloseReason::Error(e.to_string()),
                    None => {
                        break CloseReason::Remote {
                            code: None,
                            reason: String::new(),
                        }
                    }
                }
            };
            log::debug!("Connection {id} closed: {reason:?}");
            let _ = events
                .send(TransportEvent::Closed { connection: id, reason })
                .await;
        });

        log::info!("Connected to {url} (connection {id})");
        Ok(connection)
    }
}
