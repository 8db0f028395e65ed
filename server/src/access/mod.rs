/// Role-scoped path permissions.
pub mod pattern;
pub mod table;

pub use pattern::{PathPattern, PatternError};
pub use table::{AccessPolicy, AccessTable, RoleCheck};
