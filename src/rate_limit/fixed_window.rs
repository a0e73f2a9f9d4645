use crate::errors::{AppError, Result};
use redis::aio::ConnectionManager;
use std::time::{SystemTime, UNIX_EPOCH};

const RATE_LIMIT_PREFIX: &str = "ratelimit:";

/// Fixed-window rate limiter over a Redis hash.
///
/// Each key holds one live record (attempts, window_start_ms). The
/// upsert-or-increment runs inside a Lua script, so concurrent callers
/// for the same key serialize on the store; no application-level
/// locking exists. An elapsed window is treated as absent and
/// overwritten in place, with a TTL handling physical cleanup.
pub struct FixedWindowLimiter {
    redis: ConnectionManager,
    /// Grace added to record TTLs beyond the window, in seconds
    ttl_grace_seconds: u64,
}

impl FixedWindowLimiter {
    pub fn new(redis: ConnectionManager, ttl_grace_seconds: u64) -> Self {
        Self {
            redis,
            ttl_grace_seconds,
        }
    }

    /// Atomically record an attempt and decide whether it is allowed.
    pub async fn check_and_increment(
        &mut self,
        key: &str,
        limit: u64,
        window_ms: u64,
    ) -> Result<RateLimitDecision> {
        let now_ms = now_unix_ms()?;
        let redis_key = format!("{}{}", RATE_LIMIT_PREFIX, key);
        let ttl_seconds = window_ms / 1000 + self.ttl_grace_seconds;

        tracing::debug!(
            key = %key,
            limit = limit,
            window_ms = window_ms,
            "Checking rate limit"
        );

        // Upsert-or-increment must be atomic per key
        let script = redis::Script::new(
            r#"
            local key = KEYS[1]
            local now_ms = tonumber(ARGV[1])
            local window_ms = tonumber(ARGV[2])
            local ttl_seconds = tonumber(ARGV[3])

            local window_start = tonumber(redis.call('HGET', key, 'window_start'))
            local attempts

            if window_start and now_ms < window_start + window_ms then
                attempts = redis.call('HINCRBY', key, 'attempts', 1)
            else
                redis.call('HSET', key, 'attempts', 1, 'window_start', now_ms)
                redis.call('EXPIRE', key, ttl_seconds)
                attempts = 1
                window_start = now_ms
            end

            return {attempts, window_start}
            "#,
        );

        let result: Vec<u64> = script
            .key(&redis_key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(ttl_seconds)
            .invoke_async(&mut self.redis)
            .await?;

        let decision = decide(result[0], result[1], limit, window_ms);

        tracing::debug!(
            key = %key,
            allowed = decision.allowed,
            attempts = decision.attempts,
            remaining = decision.remaining,
            "Rate limit check result"
        );

        Ok(decision)
    }

    /// The live record for a key, if any, without incrementing
    pub async fn peek(&mut self, key: &str, window_ms: u64) -> Result<Option<(u64, u64)>> {
        use redis::AsyncCommands;

        let redis_key = format!("{}{}", RATE_LIMIT_PREFIX, key);
        let fields: Vec<Option<u64>> = self
            .redis
            .hget(&redis_key, &["attempts", "window_start"])
            .await?;

        let now_ms = now_unix_ms()?;
        match (fields.first().copied().flatten(), fields.get(1).copied().flatten()) {
            (Some(attempts), Some(window_start)) if now_ms < window_start + window_ms => {
                Ok(Some((attempts, window_start)))
            }
            _ => Ok(None),
        }
    }

    /// Seconds until the live window for a key elapses; 0 when no live
    /// record exists
    pub async fn retry_after_seconds(&mut self, key: &str, window_ms: u64) -> Result<u64> {
        let now_ms = now_unix_ms()?;
        match self.peek(key, window_ms).await? {
            Some((_, window_start)) => Ok(retry_after(now_ms, window_start, window_ms)),
            None => Ok(0),
        }
    }

    /// Delete the record for a key
    pub async fn reset(&mut self, key: &str) -> Result<()> {
        use redis::AsyncCommands;

        let redis_key = format!("{}{}", RATE_LIMIT_PREFIX, key);
        let _: () = self.redis.del(&redis_key).await?;

        tracing::info!(key = %key, "Rate limit reset");

        Ok(())
    }

    /// Best-effort housekeeping: delete records whose window has fully
    /// elapsed but whose TTL has not fired yet. Not required for
    /// correctness; the script treats an elapsed window as absent.
    pub async fn purge_stale(&mut self, window_ms: u64) -> Result<u64> {
        use redis::AsyncCommands;

        let now_ms = now_unix_ms()?;
        let pattern = format!("{}*", RATE_LIMIT_PREFIX);
        let mut purged = 0u64;

        let keys: Vec<String> = {
            let mut cursor = 0u64;
            let mut all = Vec::new();
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut self.redis)
                    .await?;
                all.extend(batch);
                cursor = next;
                if cursor == 0 {
                    break;
                }
            }
            all
        };

        for redis_key in keys {
            let window_start: Option<u64> = self.redis.hget(&redis_key, "window_start").await?;
            if let Some(start) = window_start {
                if now_ms >= start + window_ms {
                    let _: () = self.redis.del(&redis_key).await?;
                    purged += 1;
                }
            }
        }

        Ok(purged)
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// The rate limit (max attempts per window)
    pub limit: u64,
    /// Attempts recorded in the current window, including this one
    pub attempts: u64,
    /// Attempts remaining in the current window
    pub remaining: u64,
    /// Unix timestamp (ms) when the window resets
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    /// Seconds until the window resets, measured from now; None when
    /// the request was allowed
    pub fn retry_after(&self) -> Option<u64> {
        if self.allowed {
            return None;
        }
        let now_ms = now_unix_ms().ok()?;
        Some(self.reset_at_ms.saturating_sub(now_ms).div_ceil(1000))
    }
}

/// Map a recorded attempt count onto an allow/deny decision
pub fn decide(attempts: u64, window_start_ms: u64, limit: u64, window_ms: u64) -> RateLimitDecision {
    RateLimitDecision {
        allowed: attempts <= limit,
        limit,
        attempts,
        remaining: limit.saturating_sub(attempts),
        reset_at_ms: window_start_ms + window_ms,
    }
}

/// Seconds left in a window; 0 once the window has elapsed
pub fn retry_after(now_ms: u64, window_start_ms: u64, window_ms: u64) -> u64 {
    let elapsed = now_ms.saturating_sub(window_start_ms);
    window_ms.saturating_sub(elapsed).div_ceil(1000)
}

fn now_unix_ms() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(format!("Time error: {}", e)))?
        .as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_counts_down_to_zero() {
        // Exactly `limit` attempts in one window are allowed, with
        // remaining strictly decreasing to 0
        let limit = 5;
        let mut last_remaining = limit;
        for attempt in 1..=limit {
            let decision = decide(attempt, 1_000, limit, 60_000);
            assert!(decision.allowed, "attempt {} should be allowed", attempt);
            assert!(decision.remaining < last_remaining || attempt == 1);
            last_remaining = decision.remaining;
        }
        assert_eq!(last_remaining, 0);

        // The (limit+1)th attempt is denied
        let decision = decide(limit + 1, 1_000, limit, 60_000);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_decide_reset_at() {
        let decision = decide(1, 10_000, 10, 60_000);
        assert_eq!(decision.reset_at_ms, 70_000);
    }

    #[test]
    fn test_retry_after_elapsed_window_is_zero() {
        assert_eq!(retry_after(70_000, 10_000, 60_000), 0);
        assert_eq!(retry_after(90_000, 10_000, 60_000), 0);
    }

    #[test]
    fn test_retry_after_mid_window() {
        // 45s left of a 60s window
        assert_eq!(retry_after(25_000, 10_000, 60_000), 45);
        // Partial seconds round up so callers never retry early
        assert_eq!(retry_after(25_500, 10_000, 60_000), 45);
        assert_eq!(retry_after(69_999, 10_000, 60_000), 1);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_fixed_window_enforcement() {
        let config = crate::config::RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            connection_timeout_seconds: 5,
        };

        let redis = crate::rate_limit::store::create_client(&config).await.unwrap();
        let mut limiter = FixedWindowLimiter::new(redis, 60);

        let test_key = "test:fixed_window:basic";
        limiter.reset(test_key).await.unwrap();

        for attempt in 1..=3u64 {
            let decision = limiter
                .check_and_increment(test_key, 3, 60_000)
                .await
                .unwrap();
            assert!(decision.allowed, "attempt {} should be allowed", attempt);
            assert_eq!(decision.attempts, attempt);
        }

        let decision = limiter
            .check_and_increment(test_key, 3, 60_000)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after().is_some());

        limiter.reset(test_key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_peek_does_not_increment() {
        let config = crate::config::RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            connection_timeout_seconds: 5,
        };

        let redis = crate::rate_limit::store::create_client(&config).await.unwrap();
        let mut limiter = FixedWindowLimiter::new(redis, 60);

        let test_key = "test:fixed_window:peek";
        limiter.reset(test_key).await.unwrap();

        limiter
            .check_and_increment(test_key, 10, 60_000)
            .await
            .unwrap();
        limiter
            .check_and_increment(test_key, 10, 60_000)
            .await
            .unwrap();

        let (attempts, _) = limiter.peek(test_key, 60_000).await.unwrap().unwrap();
        assert_eq!(attempts, 2);

        let (attempts, _) = limiter.peek(test_key, 60_000).await.unwrap().unwrap();
        assert_eq!(attempts, 2);

        limiter.reset(test_key).await.unwrap();
    }
}
