pub mod fixed_window;
pub mod limiter;
pub mod middleware;
pub mod store;

pub use fixed_window::{FixedWindowLimiter, RateLimitDecision};
pub use limiter::{RateLimitScope, RateLimiter};
pub use middleware::{extract_client_ip, rate_limit_middleware};
