pub mod classify;
mod gate;
pub mod path;

pub use classify::{RouteClass, RouteClassifier};
pub use gate::AccessGate;
pub use path::{PathError, normalize_path, page_for_data_route};
