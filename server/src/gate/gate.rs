use std::sync::Arc;

use shared::types::decision::*;
use shared::types::SessionUser;
use tracing::{debug, warn};

use crate::access::{AccessPolicy, RoleCheck};
use crate::gate::classify::{RouteClass, RouteClassifier};
use crate::gate::path::page_for_data_route;
use crate::providers::{FailurePolicy, FlagStore, IdentityProvider};

/// Per-request access decision.
///
/// Stages run in a fixed order and each assumes the earlier ones passed:
///
/// ```text
/// bypass → public → maintenance → session presence → session validation
///        → account status → 2FA/phone → doctor location → role/path → allow
/// ```
///
/// Cloning is cheap; every field is shared. Nothing is cached between calls,
/// so each request revalidates its session with the identity provider.
#[derive(Clone)]
pub struct AccessGate {
    routes: Arc<RouteClassifier>,
    identity: Arc<dyn IdentityProvider>,
    flags: Arc<dyn FlagStore>,
    policy: Arc<dyn AccessPolicy>,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    pub fn new(
        routes: RouteClassifier,
        identity: Arc<dyn IdentityProvider>,
        flags: Arc<dyn FlagStore>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            identity,
            flags,
            policy,
        }
    }

    /// Decide what to do with a request for `path` carrying `session_token`
    /// (the raw session cookie value, if any). Never fails: every dependency
    /// error resolves to a decision.
    ///
    /// `path` must already be normalized (see [`normalize_path`]). Page-data
    /// requests are judged as the page they load.
    ///
    /// [`normalize_path`]: crate::gate::normalize_path
    pub async fn evaluate(&self, path: &str, session_token: Option<&str>) -> Evaluation {
        let session_token = session_token.filter(|t| !t.trim().is_empty());
        let page = page_for_data_route(path);
        let path = page.as_deref().unwrap_or(path);

        // ── Bypass / public ──────────────────────────────────────────────────
        match self.routes.classify(path) {
            RouteClass::Bypassed => {
                return Evaluation::new(Decision::Allow, Reason::StaticOrInternal, Stage::Bypass);
            }
            RouteClass::MaintenancePage => {
                return Evaluation::new(Decision::Allow, Reason::PublicRoute, Stage::Public);
            }
            RouteClass::Public => return self.evaluate_public(path, session_token).await,
            RouteClass::Protected => {}
        }

        // ── Maintenance ──────────────────────────────────────────────────────
        if self.in_maintenance().await {
            return Evaluation::new(
                Decision::Rewrite {
                    path: MAINTENANCE_PATH,
                },
                Reason::MaintenanceMode,
                Stage::Maintenance,
            );
        }

        // ── Session presence ─────────────────────────────────────────────────
        let Some(token) = session_token else {
            return Evaluation::new(
                Decision::redirect(SIGN_IN_PATH),
                Reason::MissingSession,
                Stage::SessionPresence,
            );
        };

        // ── Session validation ───────────────────────────────────────────────
        let user = match self.identity.fetch_session(token).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Session rejected for {}: {}", path, e);
                return Evaluation::new(
                    Decision::redirect_clearing_session(SIGN_IN_PATH),
                    Reason::InvalidSession,
                    Stage::SessionValidation,
                );
            }
        };

        // ── Account status ───────────────────────────────────────────────────
        let user = match user {
            Some(user) if user.is_active() => user,
            _ => {
                return Evaluation::new(
                    Decision::redirect_clearing_session(SIGN_IN_PATH),
                    Reason::InactiveAccount,
                    Stage::AccountStatus,
                );
            }
        };

        self.evaluate_user(path, user)
    }

    fn evaluate_user(&self, path: &str, user: SessionUser) -> Evaluation {
        // ── 2FA / phone ──────────────────────────────────────────────────────
        if user.needs_phone_verification() && path != OTP_PATH {
            return Evaluation::new(
                Decision::redirect(OTP_PATH),
                Reason::PhoneVerificationRequired,
                Stage::TwoFactor,
            )
            .with_user(user);
        }

        // ── Doctor location ──────────────────────────────────────────────────
        if user.needs_location() && path != VERIFY_LOCATION_PATH {
            return Evaluation::new(
                Decision::redirect(VERIFY_LOCATION_PATH),
                Reason::LocationRequired,
                Stage::Location,
            )
            .with_user(user);
        }

        // ── Role / path ──────────────────────────────────────────────────────
        let evaluation = match self.policy.check(user.role, path) {
            RoleCheck::Permitted => {
                Evaluation::new(Decision::Allow, Reason::Authorized, Stage::Allowed)
            }
            RoleCheck::UnknownRole => Evaluation::new(
                Decision::redirect(ACCESS_DENIED_PATH),
                Reason::UnknownRole,
                Stage::RolePermission,
            ),
            RoleCheck::NoMatch => Evaluation::new(
                Decision::redirect(ACCESS_DENIED_PATH),
                Reason::PathNotPermitted,
                Stage::RolePermission,
            ),
        };

        evaluation.with_user(user)
    }

    /// Public pages are open to everyone, except that a signed-in user asking
    /// for the sign-in page is sent home instead.
    async fn evaluate_public(&self, path: &str, session_token: Option<&str>) -> Evaluation {
        if path == SIGN_IN_PATH {
            if let Some(token) = session_token {
                match self.identity.fetch_session(token).await {
                    Ok(Some(user)) if user.is_active() => {
                        return Evaluation::new(
                            Decision::redirect(HOME_PATH),
                            Reason::AlreadySignedIn,
                            Stage::Public,
                        )
                        .with_user(user);
                    }
                    Ok(_) => debug!("Stale session on sign-in page, showing sign-in"),
                    Err(e) => debug!("Session on sign-in page did not validate: {}", e),
                }
            }
        }

        Evaluation::new(Decision::Allow, Reason::PublicRoute, Stage::Public)
    }

    async fn in_maintenance(&self) -> bool {
        match self.flags.maintenance_mode().await {
            Ok(on) => on,
            Err(e) => {
                let policy = self.flags.failure_policy();
                warn!("Maintenance flag unavailable ({}), failing {:?}", e, policy);
                policy == FailurePolicy::Closed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
