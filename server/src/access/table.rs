use std::collections::{BTreeMap, HashMap};

use shared::types::Role;
use tracing::debug;

use crate::access::pattern::{PathPattern, PatternError};

/// Outcome of a role/path lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCheck {
    Permitted,
    NoMatch,
    UnknownRole,
}

/// Decides whether a role may open a path.
///
/// [`AccessTable`] is the production implementation; the trait exists so the
/// gate can be driven with instrumented policies in tests.
pub trait AccessPolicy: Send + Sync {
    fn check(&self, role: Role, path: &str) -> RoleCheck;
}

/// Role → permitted path patterns, compiled once at startup and never
/// mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct AccessTable {
    rules: HashMap<Role, Vec<PathPattern>>,
}

impl AccessTable {
    /// Compile the configured rules. Duplicate patterns (including ones that
    /// differ only in parameter names) are collapsed, keeping the first.
    pub fn from_rules(rules: &BTreeMap<Role, Vec<String>>) -> Result<Self, PatternError> {
        let mut compiled = HashMap::with_capacity(rules.len());

        for (role, sources) in rules {
            let mut patterns: Vec<PathPattern> = Vec::with_capacity(sources.len());
            for source in sources {
                let pattern = PathPattern::parse(source)?;
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
            debug!("Compiled {} access patterns for role {}", patterns.len(), role);
            compiled.insert(*role, patterns);
        }

        Ok(Self { rules: compiled })
    }

    pub fn patterns(&self, role: Role) -> Option<&[PathPattern]> {
        self.rules.get(&role).map(Vec::as_slice)
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.rules.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl AccessPolicy for AccessTable {
    fn check(&self, role: Role, path: &str) -> RoleCheck {
        // `Unknown` never gets an entry, even if someone builds the table by
        // hand.
        if role == Role::Unknown {
            return RoleCheck::UnknownRole;
        }

        match self.rules.get(&role) {
            None => RoleCheck::UnknownRole,
            Some(patterns) if patterns.iter().any(|p| p.matches(path)) => RoleCheck::Permitted,
            Some(_) => RoleCheck::NoMatch,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared::types::server_config::default_access_rules;

    fn table() -> AccessTable {
        AccessTable::from_rules(&default_access_rules()).unwrap()
    }

    #[test]
    fn default_rules_compile() {
        let t = table();
        assert_eq!(t.roles().count(), Role::KNOWN.len());
    }

    #[test]
    fn admin_may_open_user_detail_doctor_may_not() {
        let t = table();
        assert_eq!(t.check(Role::Admin, "/users/5"), RoleCheck::Permitted);
        assert_eq!(t.check(Role::Doctor, "/users/5"), RoleCheck::NoMatch);
    }

    #[test]
    fn patient_may_not_open_invoices() {
        assert_eq!(table().check(Role::Patient, "/invoices"), RoleCheck::NoMatch);
    }

    #[test]
    fn doctor_may_open_doctors_page() {
        assert_eq!(table().check(Role::Doctor, "/doctors"), RoleCheck::Permitted);
    }

    #[test]
    fn role_missing_from_table_is_unknown() {
        let mut rules = BTreeMap::new();
        rules.insert(Role::Admin, vec!["/users".to_string()]);
        let t = AccessTable::from_rules(&rules).unwrap();
        assert_eq!(t.check(Role::Finance, "/users"), RoleCheck::UnknownRole);
    }

    #[test]
    fn unknown_role_is_refused_even_if_present() {
        let mut rules = BTreeMap::new();
        rules.insert(Role::Unknown, vec!["/cases".to_string()]);
        let t = AccessTable::from_rules(&rules).unwrap();
        assert_eq!(t.check(Role::Unknown, "/cases"), RoleCheck::UnknownRole);
    }

    #[test]
    fn equivalent_patterns_are_collapsed() {
        let mut rules = BTreeMap::new();
        rules.insert(
            Role::Labo,
            vec!["/cases/[id]".to_string(), "/cases/[caseId]".to_string()],
        );
        let t = AccessTable::from_rules(&rules).unwrap();
        assert_eq!(t.patterns(Role::Labo).unwrap().len(), 1);
    }

    #[test]
    fn bad_pattern_fails_compilation() {
        let mut rules = BTreeMap::new();
        rules.insert(Role::Admin, vec!["/cases/[id".to_string()]);
        assert!(AccessTable::from_rules(&rules).is_err());
    }

    #[test]
    fn empty_table_refuses_every_role() {
        let t = AccessTable::default();
        assert!(t.is_empty());
        for role in Role::KNOWN {
            assert_eq!(t.check(role, "/"), RoleCheck::UnknownRole);
        }
    }

    proptest! {
        #[test]
        fn unknown_role_never_permitted(path in "/[a-z0-9/_-]{0,40}") {
            prop_assert_eq!(table().check(Role::Unknown, &path), RoleCheck::UnknownRole);
        }

        #[test]
        fn case_detail_pattern_is_anchored(id in "[A-Za-z0-9_-]{1,12}", tail in "[a-z]{1,8}") {
            let pat = PathPattern::parse("/cases/[id]").unwrap();
            let one_segment = format!("/cases/{}", id);
            let extra_segment = format!("/cases/{}/{}", id, tail);
            let leading_segment = format!("/{}/cases/{}", tail, id);
            prop_assert!(pat.matches(&one_segment));
            prop_assert!(!pat.matches(&extra_segment));
            prop_assert!(!pat.matches(&leading_segment));
        }
    }
}
