//! Terminal chat client.
//!
//! Type a nickname to join, then type lines to chat. `/leave` exits the
//! chat and returns to the nickname prompt; EOF or Ctrl-C quits.

mod terminal;

use std::io::Stdout;
use std::time::Duration;

use clap::Parser;
use log::{debug, info};
use murmur_chat::config::DEFAULT_API_BASE;
use murmur_chat::{ChatConfig, HttpRegistrar, Session, SessionState, WsTransport};
use tokio::io::{AsyncBufReadExt, BufReader};

use terminal::TerminalUi;

type TerminalSession = Session<WsTransport, HttpRegistrar, TerminalUi<Stdout>>;

#[derive(Parser, Debug)]
#[command(name = "murmur", version, about = "Terminal chat client")]
struct Args {
    /// HTTP base URL of the chat backend
    #[arg(long, env = "MURMUR_API", default_value = DEFAULT_API_BASE)]
    api: String,

    /// WebSocket URL (derived from --api when omitted)
    #[arg(long, env = "MURMUR_WS")]
    ws: Option<String>,

    /// Register this nickname right away
    #[arg(long)]
    name: Option<String>,

    /// Seconds to wait for the socket to open (0 waits forever)
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,

    /// Messages kept in memory
    #[arg(long, default_value_t = 500)]
    history: usize,
}

impl Args {
    fn config(&self) -> ChatConfig {
        let mut config = ChatConfig::for_host(&self.api).with_history_limit(self.history);
        if let Some(ws) = &self.ws {
            config = config.with_ws_url(ws);
        }
        if self.connect_timeout > 0 {
            config = config.with_connect_timeout(Duration::from_secs(self.connect_timeout));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = args.config();
    info!("Backend {} ({})", config.api_base, config.ws_url);

    let registrar = HttpRegistrar::new(&config)?;
    let transport = WsTransport::new(config.outgoing_capacity);
    let ui = TerminalUi::new(std::io::stdout());
    let mut session = Session::new(config, transport, registrar, ui);
    let mut events = session
        .take_event_rx()
        .ok_or("event receiver already taken")?;

    session.init();
    if let Some(name) = args.name.as_deref() {
        submit(&mut session, name).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => session.handle_event(event),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                handle_line(&mut session, &line).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    let was_connected = session.state() == SessionState::Connected;
    session.close();
    if was_connected {
        // Give the writer a moment to flush the exit frame
        let _ = tokio::time::timeout(Duration::from_secs(1), events.recv()).await;
    }
    Ok(())
}

async fn handle_line(session: &mut TerminalSession, line: &str) {
    match session.state() {
        SessionState::Disconnected => submit(session, line).await,
        SessionState::Connected if line.trim() == "/leave" => session.close(),
        SessionState::Connected => {
            if !session.ui().send_enabled() {
                session.ui_mut().notice("Still loading the chat, try again in a moment.");
                return;
            }
            if let Err(e) = session.send_message(line) {
                debug!("Message not sent: {e}");
            }
        }
        other => debug!("Ignoring input while {other:?}"),
    }
}

async fn submit(session: &mut TerminalSession, name: &str) {
    if let Err(e) = session.submit_identity(name).await {
        debug!("Login failed: {e}");
    }
}
