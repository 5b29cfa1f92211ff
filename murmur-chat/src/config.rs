//! Client configuration.

use std::time::Duration;

/// Base URL of the public chat backend.
pub const DEFAULT_API_BASE: &str = "https://chat-backend-fwga.onrender.com";

/// Chat client configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// HTTP base URL; registrations go to `{api_base}/new-user`
    pub api_base: String,
    /// WebSocket endpoint
    pub ws_url: String,
    /// Upper bound on opening the socket (None = wait indefinitely)
    pub connect_timeout: Option<Duration>,
    /// Timeout for the registration request
    pub request_timeout: Duration,
    /// Transport event channel capacity
    pub event_capacity: usize,
    /// Per-connection outgoing frame buffer
    pub outgoing_capacity: usize,
    /// Received messages kept in memory
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::for_host(DEFAULT_API_BASE)
    }
}

impl ChatConfig {
    /// Configuration for a backend at `api_base`, deriving the socket URL
    /// (`http` → `ws`, `https` → `wss`, path `/ws`).
    pub fn for_host(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_owned();
        let ws_url = derive_ws_url(&api_base);
        Self {
            api_base,
            ws_url,
            connect_timeout: None,
            request_timeout: Duration::from_secs(30),
            event_capacity: 256,
            outgoing_capacity: 256,
            history_limit: 500,
        }
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Registration endpoint.
    pub fn registration_url(&self) -> String {
        format!("{}/new-user", self.api_base)
    }
}

fn derive_ws_url(api_base: &str) -> String {
    let base = if let Some(rest) = api_base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_base.to_owned()
    };
    format!("{base}/ws")
}
