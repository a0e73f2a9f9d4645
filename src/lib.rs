// Tenant Sentinel Library

pub mod api;
pub mod audit;
pub mod authz;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod observability;
pub mod overrides;
pub mod quota;
pub mod rate_limit;
pub mod spike;

pub use config::Config;
pub use errors::{AppError, Result};
