pub mod decision;
pub mod role;
pub mod server_config;
pub mod session;

pub use self::decision::{Decision, Evaluation, Reason, Stage};
pub use self::role::Role;
pub use self::server_config::{AppConfig, ConfigError};
pub use self::session::{IdentityEnvelope, SessionUser, SubjectId};
