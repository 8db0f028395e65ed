use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("flag store unreachable: {0}")]
    Transport(String),

    #[error("flag store returned HTTP {0}")]
    Status(u16),

    #[error("flag document malformed: {0}")]
    Malformed(String),
}

/// What a failed dependency call resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Behave as if the dependency had answered "nothing to block".
    Open,
    /// Behave as if the dependency had answered "block".
    Closed,
}

/// Read-only feature-flag lookup.
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn maintenance_mode(&self) -> Result<bool, FlagError>;

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Open
    }
}

/// Fixed answer. Used when no flag document is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticFlagStore {
    maintenance: bool,
}

impl StaticFlagStore {
    pub fn new(maintenance: bool) -> Self {
        Self { maintenance }
    }
}

#[async_trait]
impl FlagStore for StaticFlagStore {
    async fn maintenance_mode(&self) -> Result<bool, FlagError> {
        Ok(self.maintenance)
    }
}

/// Reads a JSON flag document over HTTP.
///
/// Accepts a flat `{ "<key>": true }` document as well as the document-store
/// REST shape `{ "fields": { "<key>": { "booleanValue": true } } }`. A
/// document that simply lacks the key means the flag is off.
#[derive(Clone, Debug)]
pub struct HttpFlagStore {
    client: reqwest::Client,
    url: String,
    key: String,
    policy: FailurePolicy,
}

impl HttpFlagStore {
    pub fn new(
        url: String,
        key: String,
        timeout: Duration,
        policy: FailurePolicy,
    ) -> Result<Self, FlagError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FlagError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url,
            key,
            policy,
        })
    }
}

#[async_trait]
impl FlagStore for HttpFlagStore {
    async fn maintenance_mode(&self) -> Result<bool, FlagError> {
        debug!("Reading flag {} from {}", self.key, self.url);

        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FlagError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlagError::Status(status.as_u16()));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|e| FlagError::Malformed(e.to_string()))?;

        read_bool_flag(&doc, &self.key)
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// Pull a boolean flag out of either supported document shape.
pub fn read_bool_flag(doc: &Value, key: &str) -> Result<bool, FlagError> {
    let raw = doc
        .get("fields")
        .and_then(|fields| fields.get(key))
        .map(|field| field.get("booleanValue").unwrap_or(field))
        .or_else(|| doc.get(key));

    match raw {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(FlagError::Malformed(format!(
            "flag {} is not a boolean: {}",
            key, other
        ))),
    }
}
