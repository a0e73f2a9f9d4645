pub mod notifications;
pub mod overrides;
pub mod pool;
pub mod projects;
pub mod quotas;
pub mod suspensions;

pub use pool::{create_pool, health_check, run_migrations};
