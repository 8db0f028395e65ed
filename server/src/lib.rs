//! Access gate for the clinical dashboard.
//!
//! Every page request is classified, its session revalidated against the
//! identity API, and its path checked against the caller's role before it
//! is proxied to the dashboard.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;

pub mod access;
pub mod app;
pub mod gate;
pub mod providers;
pub mod proxy;
pub mod tower_middle;
pub mod utils;

/// Response body for everything the gate emits or forwards.
pub type GateBody = BoxBody<Bytes, hyper::Error>;

pub use gate::AccessGate;
