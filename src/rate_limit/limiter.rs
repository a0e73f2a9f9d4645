use crate::config::RateLimitConfig;
use crate::errors::Result;
use crate::observability::metrics;
use crate::rate_limit::fixed_window::{FixedWindowLimiter, RateLimitDecision};
use redis::aio::ConnectionManager;
use uuid::Uuid;

/// The key a rate limit is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitScope {
    /// Client IP address, for unauthenticated traffic
    Ip(String),
    /// Organization / developer id, for authenticated traffic
    Org(Uuid),
    /// Operator identity, bounding manual-intervention throughput
    Operator(Uuid),
}

impl RateLimitScope {
    pub fn key(&self) -> String {
        match self {
            RateLimitScope::Ip(ip) => format!("ip:{}", ip),
            RateLimitScope::Org(id) => format!("org:{}", id),
            RateLimitScope::Operator(id) => format!("operator:{}", id),
        }
    }
}

/// Rate limiter for the request path and operator actions.
///
/// Fail-open policy: when the counter store is unreachable the check
/// returns allowed with the full budget remaining. Availability of the
/// platform outweighs strict enforcement during storage outages; the
/// failure is logged and counted so outages stay visible.
pub struct RateLimiter {
    limiter: FixedWindowLimiter,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(redis: ConnectionManager, config: RateLimitConfig) -> Self {
        let grace = config.record_ttl_grace_seconds;
        Self {
            limiter: FixedWindowLimiter::new(redis, grace),
            config,
        }
    }

    /// Check a limit for a scope, failing open on storage errors
    pub async fn check(
        &mut self,
        scope: &RateLimitScope,
        limit: u64,
        window_ms: u64,
    ) -> RateLimitDecision {
        self.check_key(&scope.key(), limit, window_ms).await
    }

    /// Windows of different lengths get their own key families so a
    /// minute counter never collides with an hourly one
    async fn check_key(&mut self, key: &str, limit: u64, window_ms: u64) -> RateLimitDecision {
        match self.limiter.check_and_increment(key, limit, window_ms).await {
            Ok(decision) => decision,
            Err(e) => {
                metrics::record_rate_limit_fail_open();
                tracing::warn!(
                    key = %key,
                    error = %e,
                    "Rate limit store unavailable, failing open"
                );
                fail_open_decision(limit, window_ms)
            }
        }
    }

    /// Per-IP limit for unauthenticated traffic (per minute)
    pub async fn check_ip_limit(&mut self, ip: &str) -> RateLimitDecision {
        let limit = self.config.ip_requests_per_minute;
        self.check_key(&format!("ip:{}", ip), limit, 60_000).await
    }

    /// Per-org limit for authenticated traffic (per minute)
    pub async fn check_org_limit(&mut self, org_id: Uuid) -> RateLimitDecision {
        let limit = self.config.org_requests_per_minute;
        self.check_key(&format!("org:minute:{}", org_id), limit, 60_000)
            .await
    }

    /// Per-org hourly limit
    pub async fn check_org_hourly_limit(&mut self, org_id: Uuid) -> RateLimitDecision {
        let limit = self.config.org_requests_per_hour;
        self.check_key(&format!("org:hour:{}", org_id), limit, 3_600_000)
            .await
    }

    /// Operator action budget for the override path
    pub async fn check_operator_budget(
        &mut self,
        operator_id: Uuid,
        actions_per_hour: u64,
    ) -> RateLimitDecision {
        let scope = RateLimitScope::Operator(operator_id);
        self.check(&scope, actions_per_hour, 3_600_000).await
    }

    /// Budget for on-demand detection triggers, tracked apart from the
    /// general operator budget
    pub async fn check_detection_trigger(
        &mut self,
        operator_id: Uuid,
        triggers_per_hour: u64,
    ) -> RateLimitDecision {
        self.check_key(
            &format!("detection:{}", operator_id),
            triggers_per_hour,
            3_600_000,
        )
        .await
    }

    /// Record an attempt without enforcement; returns the attempt count,
    /// 0 on storage error
    pub async fn record_attempt(&mut self, scope: &RateLimitScope, window_ms: u64) -> u64 {
        match self
            .limiter
            .check_and_increment(&scope.key(), u64::MAX, window_ms)
            .await
        {
            Ok(decision) => decision.attempts,
            Err(e) => {
                tracing::warn!(scope = %scope.key(), error = %e, "Failed to record attempt");
                0
            }
        }
    }

    /// Seconds until the scope's window resets; 0 when no live record
    /// exists or the store is unreachable
    pub async fn get_retry_after_seconds(
        &mut self,
        scope: &RateLimitScope,
        window_ms: u64,
    ) -> u64 {
        match self
            .limiter
            .retry_after_seconds(&scope.key(), window_ms)
            .await
        {
            Ok(seconds) => seconds,
            Err(e) => {
                tracing::warn!(scope = %scope.key(), error = %e, "Failed to read retry-after");
                0
            }
        }
    }

    /// Reset a scope's counter
    pub async fn reset(&mut self, scope: &RateLimitScope) -> Result<()> {
        self.limiter.reset(&scope.key()).await
    }

    /// Housekeeping pass over stale records
    pub async fn purge_stale(&mut self) -> Result<u64> {
        self.limiter.purge_stale(3_600_000).await
    }
}

/// The permissive decision handed out when the store cannot answer
fn fail_open_decision(limit: u64, window_ms: u64) -> RateLimitDecision {
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    RateLimitDecision {
        allowed: true,
        limit,
        attempts: 0,
        remaining: limit,
        reset_at_ms: now_ms + window_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_keys() {
        let id = Uuid::nil();
        assert_eq!(RateLimitScope::Ip("203.0.113.9".into()).key(), "ip:203.0.113.9");
        assert_eq!(
            RateLimitScope::Org(id).key(),
            format!("org:{}", id)
        );
        assert_eq!(
            RateLimitScope::Operator(id).key(),
            format!("operator:{}", id)
        );
    }

    #[test]
    fn test_fail_open_decision_grants_full_budget() {
        let decision = fail_open_decision(100, 60_000);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 100);
        assert_eq!(decision.attempts, 0);
    }

    #[tokio::test]
    async fn test_check_fails_open_without_store() {
        // Connection manager pointed at a closed port: every call errors
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let Ok(manager) = redis::aio::ConnectionManager::new(client).await else {
            // Manager construction itself may fail without a server,
            // which exercises the same policy at bootstrap
            return;
        };

        let config = crate::config::RateLimitConfig {
            ip_requests_per_minute: 50,
            org_requests_per_minute: 100,
            org_requests_per_hour: 1_000,
            record_ttl_grace_seconds: 60,
        };
        let mut limiter = RateLimiter::new(manager, config);

        let decision = limiter.check_ip_limit("203.0.113.9").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 50);

        let scope = RateLimitScope::Ip("203.0.113.9".into());
        assert_eq!(limiter.get_retry_after_seconds(&scope, 60_000).await, 0);
        assert_eq!(limiter.record_attempt(&scope, 60_000).await, 0);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_scope_check_round_trip() {
        let config = crate::config::RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            connection_timeout_seconds: 5,
        };
        let redis = crate::rate_limit::store::create_client(&config).await.unwrap();

        let rate_config = crate::config::RateLimitConfig {
            ip_requests_per_minute: 50,
            org_requests_per_minute: 2,
            org_requests_per_hour: 1_000,
            record_ttl_grace_seconds: 60,
        };
        let mut limiter = RateLimiter::new(redis, rate_config);

        let org = Uuid::new_v4();
        let scope = RateLimitScope::Org(org);
        limiter.reset(&scope).await.unwrap();

        assert!(limiter.check(&scope, 2, 60_000).await.allowed);
        assert!(limiter.check(&scope, 2, 60_000).await.allowed);
        let denied = limiter.check(&scope, 2, 60_000).await;
        assert!(!denied.allowed);
        assert!(limiter.get_retry_after_seconds(&scope, 60_000).await > 0);

        limiter.reset(&scope).await.unwrap();
    }
}
