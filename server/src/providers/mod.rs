/// Adapters for the gate's two external dependencies.
///
/// Each adapter owns its failure behaviour: identity always fails closed,
/// the flag store reports its own [`FailurePolicy`].
pub mod flags;
pub mod identity;

pub use flags::{FailurePolicy, FlagError, FlagStore, HttpFlagStore, StaticFlagStore};
pub use identity::{HttpIdentityProvider, IdentityError, IdentityProvider};
