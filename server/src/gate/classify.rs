use std::collections::{BTreeMap, BTreeSet};

use shared::types::Role;
use shared::types::decision::MAINTENANCE_PATH;
use shared::types::server_config::RoutesConfig;

use crate::gate::path::PAGE_DATA_PREFIX;

/// Bucket a request path falls into. Every path lands in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Framework assets, API namespace, static files.
    Bypassed,
    /// The maintenance page itself.
    MaintenancePage,
    Public,
    Protected,
}

/// Static route lists compiled from `[routes]`.
///
/// A file extension only marks a path as static outside the protected route
/// trees, i.e. when its first segment is not the root of any access-table
/// pattern. `/images/logo.png` is a file; `/cases/logo.png` could be a
/// dynamic case id and goes through the gate.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    public_paths: Vec<String>,
    public_prefixes: Vec<String>,
    bypass_prefixes: Vec<String>,
    static_extensions: Vec<String>,
    protected_roots: BTreeSet<String>,
    /// Some pattern starts with a parameter, so every first segment may be a
    /// page.
    all_roots_protected: bool,
}

impl RouteClassifier {
    pub fn new(routes: &RoutesConfig, access: &BTreeMap<Role, Vec<String>>) -> Self {
        let mut protected_roots = BTreeSet::new();
        let mut all_roots_protected = false;

        for pattern in access.values().flatten() {
            match pattern.trim_start_matches('/').split('/').next() {
                None | Some("") => {}
                Some(root) if root.contains('[') => all_roots_protected = true,
                Some(root) => {
                    protected_roots.insert(root.to_string());
                }
            }
        }

        Self {
            public_paths: routes.public_paths.clone(),
            public_prefixes: routes.public_prefixes.iter().map(|p| trim_prefix(p)).collect(),
            bypass_prefixes: routes.bypass_prefixes.iter().map(|p| trim_prefix(p)).collect(),
            static_extensions: routes
                .static_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            protected_roots,
            all_roots_protected,
        }
    }

    /// `path` must already be normalized.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.is_bypassed(path) {
            RouteClass::Bypassed
        } else if path == MAINTENANCE_PATH {
            RouteClass::MaintenancePage
        } else if self.is_public(path) {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_prefixes
            .iter()
            .any(|prefix| under_prefix(path, prefix))
            || (!self.in_protected_tree(path) && self.has_static_extension(path))
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
            || self
                .public_prefixes
                .iter()
                .any(|prefix| under_prefix(path, prefix))
    }

    fn in_protected_tree(&self, path: &str) -> bool {
        if self.all_roots_protected || path.starts_with(PAGE_DATA_PREFIX) {
            return true;
        }
        let root = path.trim_start_matches('/').split('/').next().unwrap_or("");
        self.protected_roots.contains(root)
    }

    fn has_static_extension(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or(path);
        match last.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.static_extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

fn trim_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `path` is `prefix` itself or lives below it. `/api` covers `/api` and
/// `/api/x` but not `/apiary`.
fn under_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
