use std::fmt;

use serde::Serialize;

use crate::types::session::SessionUser;

// ---------------------------------------------------------------------------
// Fixed navigation targets
// ---------------------------------------------------------------------------

pub const HOME_PATH: &str = "/";
pub const SIGN_IN_PATH: &str = "/signin";
pub const OTP_PATH: &str = "/otp";
pub const VERIFY_LOCATION_PATH: &str = "/verify-location";
pub const ACCESS_DENIED_PATH: &str = "/access-denied";
pub const MAINTENANCE_PATH: &str = "/maintenance";

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// What the gate wants done with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Let the request through untouched.
    Allow,
    /// Send the browser elsewhere. `clear_session` expires the session cookie
    /// on the same response.
    Redirect {
        location: &'static str,
        clear_session: bool,
    },
    /// Serve another page under the same URL.
    Rewrite { path: &'static str },
}

impl Decision {
    pub fn redirect(location: &'static str) -> Self {
        Decision::Redirect {
            location,
            clear_session: false,
        }
    }

    pub fn redirect_clearing_session(location: &'static str) -> Self {
        Decision::Redirect {
            location,
            clear_session: true,
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Redirect {
                location,
                clear_session: true,
            } => write!(f, "redirect {} (clear session)", location),
            Decision::Redirect { location, .. } => write!(f, "redirect {}", location),
            Decision::Rewrite { path } => write!(f, "rewrite {}", path),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage / Reason
// ---------------------------------------------------------------------------

/// Gate stages in evaluation order. The derived `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Bypass,
    Public,
    Maintenance,
    SessionPresence,
    SessionValidation,
    AccountStatus,
    TwoFactor,
    Location,
    RolePermission,
    Allowed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Bypass => "bypass",
            Stage::Public => "public",
            Stage::Maintenance => "maintenance",
            Stage::SessionPresence => "session_presence",
            Stage::SessionValidation => "session_validation",
            Stage::AccountStatus => "account_status",
            Stage::TwoFactor => "two_factor",
            Stage::Location => "location",
            Stage::RolePermission => "role_permission",
            Stage::Allowed => "allowed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    StaticOrInternal,
    PublicRoute,
    AlreadySignedIn,
    MaintenanceMode,
    MissingSession,
    InvalidSession,
    InactiveAccount,
    PhoneVerificationRequired,
    LocationRequired,
    UnknownRole,
    PathNotPermitted,
    Authorized,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::StaticOrInternal => "static_or_internal",
            Reason::PublicRoute => "public_route",
            Reason::AlreadySignedIn => "already_signed_in",
            Reason::MaintenanceMode => "maintenance_mode",
            Reason::MissingSession => "missing_session",
            Reason::InvalidSession => "invalid_session",
            Reason::InactiveAccount => "inactive_account",
            Reason::PhoneVerificationRequired => "phone_verification_required",
            Reason::LocationRequired => "location_required",
            Reason::UnknownRole => "unknown_role",
            Reason::PathNotPermitted => "path_not_permitted",
            Reason::Authorized => "authorized",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Explainable gate outcome: what to do, why, and how far evaluation got.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub reason: Reason,
    pub stage: Stage,
    /// The validated account, when evaluation got far enough to fetch one.
    #[serde(skip)]
    pub user: Option<SessionUser>,
}

impl Evaluation {
    pub fn new(decision: Decision, reason: Reason, stage: Stage) -> Self {
        Self {
            decision,
            reason,
            stage,
            user: None,
        }
    }

    pub fn with_user(mut self, user: SessionUser) -> Self {
        self.user = Some(user);
        self
    }
}
