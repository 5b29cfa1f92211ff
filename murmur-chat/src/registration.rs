//! Identity registration against the backend's `POST /new-user` endpoint.
//!
//! ```text
//! POST {api_base}/new-user   {"name":"Alice"}
//!   200 {"status":"ok", …}      → registered
//!   409 {"status":"error", …}   → name taken
//! ```
//!
//! Both 200 and 409 carry a status body; only `"ok"` counts as success.

use std::future::Future;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatConfig;
use crate::protocol::Identity;

/// Registers identities with the backend before the socket is opened.
pub trait Registrar {
    fn register(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), RegistrationError>> + Send;
}

/// Identity was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Display name must not be empty")]
    InvalidName,
    #[error("Registration rejected with status {status:?}")]
    Rejected { status: String },
    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
    #[error("Registration endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("Malformed registration response: {0}")]
    MalformedResponse(String),
    #[error("HTTP client error: {0}")]
    Client(String),
}

#[derive(Debug, Serialize)]
struct NewUserRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct NewUserResponse {
    status: String,
}

/// `Registrar` backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpRegistrar {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRegistrar {
    pub fn new(config: &ChatConfig) -> Result<Self, RegistrationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RegistrationError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.registration_url(),
        })
    }

    /// Full URL registrations are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Registrar for HttpRegistrar {
    async fn register(&self, identity: &Identity) -> Result<(), RegistrationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&NewUserRequest {
                name: identity.as_str(),
            })
            .send()
            .await
            .map_err(|e| RegistrationError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CONFLICT {
            return Err(RegistrationError::UnexpectedStatus(status.as_u16()));
        }

        let body: NewUserResponse = response
            .json()
            .await
            .map_err(|e| RegistrationError::MalformedResponse(e.to_string()))?;

        if body.status != "ok" {
            log::debug!("Backend refused {identity}: {}", body.status);
            return Err(RegistrationError::Rejected {
                status: body.status,
            });
        }
        Ok(())
    }
}
