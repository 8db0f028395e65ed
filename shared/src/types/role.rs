use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role as reported by the identity endpoint.
///
/// The set is closed. Any value the gate does not recognise lands in
/// [`Role::Unknown`], which no access table may grant anything to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Labo,
    Patient,
    Hachem,
    Commercial,
    Finance,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub const KNOWN: [Role; 7] = [
        Role::Admin,
        Role::Doctor,
        Role::Labo,
        Role::Patient,
        Role::Hachem,
        Role::Commercial,
        Role::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Labo => "labo",
            Role::Patient => "patient",
            Role::Hachem => "hachem",
            Role::Commercial => "commercial",
            Role::Finance => "finance",
            Role::Unknown => "unknown",
        }
    }

    /// Doctors must have coordinates on file before reaching any page
    /// other than the location form.
    pub fn requires_location(&self) -> bool {
        matches!(self, Role::Doctor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = Role::KNOWN
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(Role::Unknown);
        Ok(role)
    }
}
