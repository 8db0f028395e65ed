use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::role::Role;

// ---------------------------------------------------------------------------
// Identity wire types
// ---------------------------------------------------------------------------

/// Opaque subject identifier. The identity API has served both numeric and
/// string ids over time, so accept either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectId::Numeric(n) => write!(f, "{}", n),
            SubjectId::Text(s) => f.write_str(s),
        }
    }
}

/// The signed-in account as returned by `GET /me`.
///
/// Only the fields the gate looks at are modelled; the rest of the user
/// object is ignored. Missing flags deserialize as `false` so a sparse
/// payload can never accidentally unlock anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: SubjectId,
    pub role: Role,
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub phone_verified: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl SessionUser {
    pub fn is_active(&self) -> bool {
        self.status
    }

    /// Phone confirmation is owed when 2FA is on but the number was never
    /// verified.
    pub fn needs_phone_verification(&self) -> bool {
        self.two_factor_enabled && !self.phone_verified
    }

    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn needs_location(&self) -> bool {
        self.role.requires_location() && !self.has_location()
    }
}

#[derive(Debug, Deserialize)]
pub struct IdentityData {
    #[serde(default)]
    pub user: Option<SessionUser>,
}

/// `{ "status": "success", "data": { "user": { ... } } }`
#[derive(Debug, Deserialize)]
pub struct IdentityEnvelope {
    pub status: String,
    #[serde(default)]
    pub data: Option<IdentityData>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// `status` was something other than `"success"`.
    #[error("envelope status was {0:?}")]
    NotSuccess(String),
    /// `status` was `"success"` but `data` was missing.
    #[error("envelope has no data")]
    MissingData,
}

impl IdentityEnvelope {
    /// Unwrap the envelope. `Ok(None)` means the endpoint answered
    /// successfully but had no user for this session.
    pub fn into_user(self) -> Result<Option<SessionUser>, EnvelopeError> {
        if self.status != "success" {
            return Err(EnvelopeError::NotSuccess(self.status));
        }
        self.data
            .map(|d| d.user)
            .ok_or(EnvelopeError::MissingData)
    }
}
