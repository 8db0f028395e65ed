use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use shared::types::session::{EnvelopeError, IdentityEnvelope};
use shared::types::SessionUser;
use thiserror::Error;
use tracing::debug;

/// Why the identity endpoint could not vouch for a session.
///
/// Every variant means the same thing to the gate: the session is invalid.
/// There is no fail-open path for identity.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("identity endpoint unreachable: {0}")]
    Transport(String),

    #[error("identity endpoint returned HTTP {0}")]
    Status(u16),

    #[error("identity payload malformed: {0}")]
    Malformed(String),

    #[error("identity envelope rejected: {0}")]
    Rejected(#[from] EnvelopeError),
}

/// Source of truth for "who owns this session cookie".
///
/// `Ok(None)` is a well-formed answer with no user attached.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_session(&self, session_token: &str)
    -> Result<Option<SessionUser>, IdentityError>;
}

/// `GET /me` over HTTP, forwarding the session cookie.
#[derive(Clone, Debug)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    me_url: String,
    cookie_name: String,
}

impl HttpIdentityProvider {
    pub fn new(me_url: String, cookie_name: String, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            me_url,
            cookie_name,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn fetch_session(
        &self,
        session_token: &str,
    ) -> Result<Option<SessionUser>, IdentityError> {
        debug!("Validating session against {}", self.me_url);

        let response = self
            .client
            .get(&self.me_url)
            .header(ACCEPT, "application/json")
            .header(COOKIE, format!("{}={}", self.cookie_name, session_token))
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let envelope: IdentityEnvelope =
            serde_json::from_slice(&body).map_err(|e| IdentityError::Malformed(e.to_string()))?;

        Ok(envelope.into_user()?)
    }
}
