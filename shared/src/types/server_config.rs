use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::role::Role;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Dashboard origin that allowed traffic is proxied to.
    #[serde(default = "default_upstream")]
    pub upstream: String,
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Emit `Secure` on the cookie-clearing header. Only turn off for local
    /// plain-HTTP development.
    #[serde(default = "default_true")]
    pub secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    /// Origin of the REST API, e.g. `https://api.example.com`.
    pub base_url: String,
    #[serde(default = "default_me_path")]
    pub me_path: String,
    #[serde(default = "default_identity_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FlagsConfig {
    /// Document holding the maintenance flag. When unset the gate assumes
    /// maintenance is off and never makes the call.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_maintenance_key")]
    pub maintenance_key: String,
    #[serde(default = "default_flags_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub fail_open: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutesConfig {
    /// Paths that are public only when matched exactly.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
    /// Paths that are public together with everything below them.
    #[serde(default = "default_public_prefixes")]
    pub public_prefixes: Vec<String>,
    /// Framework-internal and API namespaces that skip the gate entirely.
    #[serde(default = "default_bypass_prefixes")]
    pub bypass_prefixes: Vec<String>,
    /// File extensions (without the dot) served as static assets.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    /// Role → path patterns. Replaces the built-in table wholesale when
    /// present.
    #[serde(default = "default_access_rules")]
    pub access: BTreeMap<Role, Vec<String>>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"0.0.0.0:3000"`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl IdentityConfig {
    pub fn me_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.me_path.trim_start_matches('/')
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            upstream: default_upstream(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure: true,
        }
    }
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            url: None,
            maintenance_key: default_maintenance_key(),
            timeout_ms: default_flags_timeout_ms(),
            fail_open: true,
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            public_paths: default_public_paths(),
            public_prefixes: default_public_prefixes(),
            bypass_prefixes: default_bypass_prefixes(),
            static_extensions: default_static_extensions(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_upstream() -> String {
    "http://127.0.0.1:3001".to_string()
}

pub fn default_upstream_timeout_ms() -> u64 {
    30_000
}

pub fn default_cookie_name() -> String {
    "realsmile.session".to_string()
}

pub fn default_me_path() -> String {
    "/api/v1/auth/me".to_string()
}

pub fn default_identity_timeout_ms() -> u64 {
    5_000
}

pub fn default_maintenance_key() -> String {
    "isInMaintenanceMode".to_string()
}

pub fn default_flags_timeout_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn default_public_paths() -> Vec<String> {
    strings(&[
        "/",
        "/signin",
        "/signup",
        "/forgot-password",
        "/reset-password",
        "/otp",
        "/access-denied",
        "/maintenance",
        "/verify-location",
    ])
}

pub fn default_public_prefixes() -> Vec<String> {
    strings(&["/verify-email"])
}

/// Framework asset namespaces only. `/_next/data` carries page props and is
/// gated like the page it belongs to.
pub fn default_bypass_prefixes() -> Vec<String> {
    strings(&["/_next/static", "/_next/image", "/api"])
}

/// Presentation assets. Formats that carry records (`json`, `pdf`, `stl`)
/// are left out.
pub fn default_static_extensions() -> Vec<String> {
    strings(&[
        "ico", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "css", "js", "txt", "xml",
        "webmanifest", "woff", "woff2", "ttf", "otf",
    ])
}

/// Built-in role table for the dashboard.
pub fn default_access_rules() -> BTreeMap<Role, Vec<String>> {
    let mut rules = BTreeMap::new();

    rules.insert(
        Role::Admin,
        strings(&[
            "/dashboard",
            "/cases",
            "/cases/create",
            "/cases/[id]",
            "/cases/[id]/treatment",
            "/doctors",
            "/doctors/[id]",
            "/patients",
            "/patients/[id]",
            "/labs",
            "/users",
            "/users/[id]",
            "/invoices",
            "/invoices/[id]",
            "/payments",
            "/notifications",
            "/tickets",
            "/tickets/[id]",
            "/profile",
            "/settings",
        ]),
    );
    rules.insert(
        Role::Doctor,
        strings(&[
            "/dashboard",
            "/doctors",
            "/cases",
            "/cases/create",
            "/cases/[id]",
            "/cases/[id]/treatment",
            "/patients",
            "/patients/[id]",
            "/invoices",
            "/invoices/[id]",
            "/notifications",
            "/tickets",
            "/tickets/[id]",
            "/profile",
            "/settings",
        ]),
    );
    rules.insert(
        Role::Labo,
        strings(&[
            "/dashboard",
            "/cases",
            "/cases/[id]",
            "/cases/[id]/treatment",
            "/notifications",
            "/tickets",
            "/tickets/[id]",
            "/profile",
        ]),
    );
    rules.insert(
        Role::Patient,
        strings(&["/dashboard", "/treatment", "/notifications", "/profile"]),
    );
    rules.insert(
        Role::Hachem,
        strings(&[
            "/dashboard",
            "/cases",
            "/cases/[id]",
            "/cases/[id]/treatment",
            "/doctors",
            "/doctors/[id]",
            "/notifications",
            "/profile",
        ]),
    );
    rules.insert(
        Role::Commercial,
        strings(&[
            "/dashboard",
            "/doctors",
            "/doctors/[id]",
            "/cases",
            "/notifications",
            "/profile",
        ]),
    );
    rules.insert(
        Role::Finance,
        strings(&[
            "/dashboard",
            "/invoices",
            "/invoices/[id]",
            "/payments",
            "/doctors",
            "/notifications",
            "/profile",
        ]),
    );

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [identity]
        base_url = "https://api.example.com/"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(cfg.session.cookie_name, "realsmile.session");
        assert!(cfg.session.secure);
        assert!(cfg.flags.fail_open);
        assert!(cfg.flags.url.is_none());
        assert_eq!(cfg.server.listen_addr(), "0.0.0.0:3000");
        assert!(cfg.access.contains_key(&Role::Admin));
        assert!(!cfg.access.contains_key(&Role::Unknown));
    }

    #[test]
    fn me_url_joins_without_double_slash() {
        let cfg: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(cfg.identity.me_url(), "https://api.example.com/api/v1/auth/me");
    }

    #[test]
    fn access_table_override_replaces_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [identity]
            base_url = "http://localhost:8000"

            [access]
            admin = ["/users"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.access.len(), 1);
        assert_eq!(cfg.access[&Role::Admin], vec!["/users".to_string()]);
    }

    #[test]
    fn unrecognised_role_key_parses_as_unknown() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [identity]
            base_url = "http://localhost:8000"

            [access]
            janitor = ["/mop"]
            "#,
        )
        .unwrap();
        assert!(cfg.access.contains_key(&Role::Unknown));
    }
}
