pub mod gate;

pub use gate::{actor_from_headers, require_operator_or_admin};
