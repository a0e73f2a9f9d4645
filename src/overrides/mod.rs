pub mod service;

pub use service::{OverrideRequest, OverrideService};
