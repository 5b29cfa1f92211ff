//! Integration tests for the full session stack.
//!
//! These tests start an in-process backend (axum) that speaks the same
//! HTTP + WebSocket protocol as the public chat server, then drive real
//! sessions through `HttpRegistrar` and `WsTransport`.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Duration};

use murmur_chat::protocol::{InboundFrame, OutboundFrame, PresenceEntry};
use murmur_chat::{
    ChatConfig, ConnectError, HttpRegistrar, Identity, MessageView, RegistrationError, RosterView,
    Session, SessionError, SessionState, TransportEvent, UiAdapter, WsTransport,
};

// ─── Fake backend ────────────────────────────────────────────────

struct Backend {
    users: Mutex<Vec<PresenceEntry>>,
    next_id: AtomicU64,
    /// Frames fanned out to every socket
    frames: broadcast::Sender<String>,
    /// Forces every socket closed
    kick: broadcast::Sender<()>,
    /// Send tagged roster frames instead of bare arrays
    tagged: bool,
}

impl Backend {
    fn new(tagged: bool) -> Self {
        let (frames, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);
        Self {
            users: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            frames,
            kick,
            tagged,
        }
    }

    fn broadcast_roster(&self) {
        let users = self.users.lock().unwrap().clone();
        let text = if self.tagged {
            String::from_utf8(InboundFrame::Roster { users }.encode().unwrap()).unwrap()
        } else {
            serde_json::to_string(&users).unwrap()
        };
        let _ = self.frames.send(text);
    }

    fn handle_client_frame(&self, text: &str) {
        match OutboundFrame::decode(text.as_bytes()) {
            // Echoed verbatim, as the public server does
            Ok(OutboundFrame::Send { .. }) => {
                let _ = self.frames.send(text.to_owned());
            }
            Ok(OutboundFrame::Exit { user }) => {
                self.users.lock().unwrap().retain(|u| u.identity != user.name);
                self.broadcast_roster();
            }
            Err(_) => {}
        }
    }

    fn kick_all(&self) {
        let _ = self.kick.send(());
    }
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

async fn new_user(
    State(backend): State<Arc<Backend>>,
    Json(body): Json<NewUser>,
) -> impl IntoResponse {
    let Some(identity) = Identity::parse(&body.name) else {
        return (StatusCode::CONFLICT, Json(json!({"status": "error"})));
    };
    let mut users = backend.users.lock().unwrap();
    if users.iter().any(|u| u.identity == identity) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"status": "error", "message": "This name is already taken!"})),
        );
    }
    let id = backend.next_id.fetch_add(1, Ordering::Relaxed).to_string();
    users.push(PresenceEntry::new(identity.clone(), id.clone()));
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "user": {"id": id, "name": identity.as_str()}})),
    )
}

async fn ws_handler(ws: WebSocketUpgrade, State(backend): State<Arc<Backend>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, backend))
}

async fn handle_socket(socket: WebSocket, backend: Arc<Backend>) {
    let (mut sink, mut stream) = socket.split();
    let mut frames = backend.frames.subscribe();
    let mut kick = backend.kick.subscribe();
    backend.broadcast_roster();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            _ = kick.recv() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => backend.handle_client_frame(text.as_str()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Start a backend on a free port, return its HTTP base URL.
async fn start_backend(tagged: bool) -> (String, Arc<Backend>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let backend = Arc::new(Backend::new(tagged));
    let app = Router::new()
        .route("/new-user", post(new_user))
        .route("/ws", get(ws_handler))
        .with_state(backend.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), backend)
}

// ─── Client helpers ──────────────────────────────────────────────

#[derive(Default)]
struct RecordingUi {
    rosters: Vec<Vec<RosterView>>,
    messages: Vec<MessageView>,
    warnings: usize,
    send_enabled: bool,
}

impl UiAdapter for RecordingUi {
    fn render_roster(&mut self, roster: &[RosterView]) {
        self.rosters.push(roster.to_vec());
    }
    fn render_message(&mut self, message: &MessageView) {
        self.messages.push(message.clone());
    }
    fn render_warning(&mut self) {
        self.warnings += 1;
    }
    fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
    }
}

type ChatSession = Session<WsTransport, HttpRegistrar, RecordingUi>;

fn new_session(config: ChatConfig) -> (ChatSession, mpsc::Receiver<TransportEvent>) {
    let registrar = HttpRegistrar::new(&config).unwrap();
    let mut session = Session::new(config, WsTransport::default(), registrar, RecordingUi::default());
    let events = session.take_event_rx().unwrap();
    (session, events)
}

async fn join(base: &str, name: &str) -> (ChatSession, mpsc::Receiver<TransportEvent>) {
    let config = ChatConfig::for_host(base).with_connect_timeout(Duration::from_secs(2));
    let (mut session, events) = new_session(config);
    session.submit_identity(name).await.unwrap();
    (session, events)
}

/// Feed events into the session until `done` holds.
async fn pump_until<F>(session: &mut ChatSession, events: &mut mpsc::Receiver<TransportEvent>, mut done: F)
where
    F: FnMut(&ChatSession) -> bool,
{
    timeout(Duration::from_secs(3), async {
        while !done(session) {
            let event = events.recv().await.expect("event channel open");
            session.handle_event(event);
        }
    })
    .await
    .expect("condition reached within timeout");
}

fn roster_names(session: &ChatSession) -> Vec<String> {
    session.registry().identities().map(|i| i.to_string()).collect()
}

// ─── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_connect_and_receive_roster() {
    let (base, _backend) = start_backend(false).await;
    let (mut alice, mut events) = join(&base, "Alice").await;
    assert_eq!(alice.state(), SessionState::Connected);

    pump_until(&mut alice, &mut events, |s| !s.registry().is_empty()).await;

    assert_eq!(roster_names(&alice), vec!["Alice"]);
    assert!(alice.is_loaded());
    assert!(alice.ui().send_enabled);
    assert_eq!(alice.ui().rosters.last().unwrap()[0].label, "You");
    assert_eq!(alice.router_stats().legacy, 1);
}

#[tokio::test]
async fn test_tagged_backend_roster() {
    let (base, _backend) = start_backend(true).await;
    let (mut alice, mut events) = join(&base, "Alice").await;

    pump_until(&mut alice, &mut events, |s| !s.registry().is_empty()).await;

    assert_eq!(roster_names(&alice), vec!["Alice"]);
    assert_eq!(alice.router_stats().tagged, 1);
    assert_eq!(alice.router_stats().legacy, 0);
}

#[tokio::test]
async fn test_sent_message_is_echoed_back() {
    let (base, _backend) = start_backend(false).await;
    let (mut alice, mut events) = join(&base, "Alice").await;
    pump_until(&mut alice, &mut events, |s| s.is_loaded()).await;

    assert!(alice.send_message("hi").unwrap());
    pump_until(&mut alice, &mut events, |s| s.messages().count() == 1).await;

    let msg = alice.messages().next().unwrap();
    assert_eq!(msg.text, "hi");
    assert_eq!(msg.sender.as_str(), "Alice");
    assert!(msg.timestamp > 0);
    assert_eq!(alice.ui().messages[0].author, "You");
    // Echoed frames carry "type":"send" and are routed as tagged messages
    assert_eq!(alice.router_stats().tagged, 1);
}

#[tokio::test]
async fn test_two_users_chat() {
    let (base, _backend) = start_backend(false).await;
    let (mut alice, mut alice_events) = join(&base, "Alice").await;
    let (mut bob, mut bob_events) = join(&base, "Bob").await;

    pump_until(&mut alice, &mut alice_events, |s| s.registry().len() == 2).await;
    pump_until(&mut bob, &mut bob_events, |s| s.registry().len() == 2).await;

    bob.send_message("hello alice").unwrap();
    pump_until(&mut alice, &mut alice_events, |s| s.messages().count() == 1).await;

    let view = &alice.ui().messages[0];
    assert_eq!(view.author, "Bob");
    assert!(!view.is_own);
    assert_eq!(view.text, "hello alice");
}

#[tokio::test]
async fn test_taken_name_warns_once() {
    let (base, _backend) = start_backend(false).await;
    let (_alice, _events) = join(&base, "Alice").await;

    let (mut impostor, _impostor_events) = new_session(ChatConfig::for_host(&base));
    let result = impostor.submit_identity("Alice").await;

    assert_eq!(
        result,
        Err(SessionError::Registration(RegistrationError::Rejected {
            status: "error".into()
        }))
    );
    assert_eq!(impostor.state(), SessionState::Disconnected);
    assert_eq!(impostor.ui().warnings, 1);

    // Re-entry with a free name works
    impostor.submit_identity("Mallory").await.unwrap();
    assert_eq!(impostor.state(), SessionState::Connected);
    assert_eq!(impostor.ui().warnings, 1);
}

#[tokio::test]
async fn test_close_announces_exit() {
    let (base, backend) = start_backend(false).await;
    let (mut alice, mut alice_events) = join(&base, "Alice").await;
    let (mut bob, mut bob_events) = join(&base, "Bob").await;
    pump_until(&mut alice, &mut alice_events, |s| s.registry().len() == 2).await;
    pump_until(&mut bob, &mut bob_events, |s| s.is_loaded()).await;

    bob.close();
    assert_eq!(bob.state(), SessionState::Disconnected);
    assert!(bob.registry().is_empty());
    assert!(!bob.ui().send_enabled);

    pump_until(&mut alice, &mut alice_events, |s| s.registry().len() == 1).await;
    assert_eq!(roster_names(&alice), vec!["Alice"]);
    assert_eq!(backend.users.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_server_close_disconnects() {
    let (base, backend) = start_backend(false).await;
    let (mut alice, mut events) = join(&base, "Alice").await;
    pump_until(&mut alice, &mut events, |s| s.is_loaded()).await;

    backend.kick_all();
    pump_until(&mut alice, &mut events, |s| s.state() == SessionState::Disconnected).await;

    assert!(alice.registry().is_empty());
    assert!(alice.identity().is_none());
    assert!(!alice.send_message("anyone?").unwrap());
}

#[tokio::test]
async fn test_unreachable_socket_is_connect_error() {
    let (base, _backend) = start_backend(false).await;
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = dead.local_addr().unwrap().port();
    drop(dead);

    let config = ChatConfig::for_host(&base).with_ws_url(format!("ws://127.0.0.1:{dead_port}/ws"));
    let (mut session, _events) = new_session(config);
    let result = session.submit_identity("Alice").await;

    assert!(matches!(
        result,
        Err(SessionError::Connect(ConnectError::Unreachable { .. }))
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.ui().warnings, 0);
}

#[tokio::test]
async fn test_malformed_server_frame_is_skipped() {
    let (base, backend) = start_backend(false).await;
    let (mut alice, mut events) = join(&base, "Alice").await;
    pump_until(&mut alice, &mut events, |s| s.is_loaded()).await;

    let _ = backend.frames.send("{not json".to_owned());
    let _ = backend.frames.send(json!({"type": "typing", "name": "Bob"}).to_string());
    let _ = backend
        .frames
        .send(json!({"name": "Bob", "text": "still here", "date": 1}).to_string());

    pump_until(&mut alice, &mut events, |s| s.messages().count() == 1).await;
    assert_eq!(alice.router_stats().rejected, 2);
    assert_eq!(alice.state(), SessionState::Connected);

    let last: Value = serde_json::to_value(alice.messages().last().unwrap()).unwrap();
    assert_eq!(last["text"], "still here");
}
