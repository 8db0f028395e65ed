/// Tower middleware module
///
/// This module contains the Tower layer that puts the access gate in front
/// of the dashboard upstream.
pub mod tower_access_gate;

pub use tower_access_gate::{AccessGateLayer, AccessGateService, REWRITE_HEADER};
