use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub rate_limit: RateLimitConfig,
    pub spike: SpikeConfig,
    pub audit: AuditConfig,
    pub overrides: OverrideConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    pub connection_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub ip_requests_per_minute: u64,
    pub org_requests_per_minute: u64,
    pub org_requests_per_hour: u64,
    /// Grace added to record TTLs beyond the window, in seconds
    pub record_ttl_grace_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpikeConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Trailing full days used for the usage baseline, excluding today
    pub baseline_days: u32,
    /// Ascending severity ladder; each value is a multiple of the baseline
    pub warning_multiplier: f64,
    pub suspension_multiplier: f64,
    pub critical_multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub channel_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverrideConfig {
    /// Per-operator action budget, bounds the blast radius of a
    /// compromised operator credential
    pub operator_actions_per_hour: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Determine environment
        let environment = env::var("SENTINEL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // Environment variables with prefix SENTINEL,
            // e.g. SENTINEL__SERVER__PORT=8080
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(AppError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if self.redis.url.is_empty() {
            return Err(AppError::Configuration("Redis URL is required".to_string()));
        }

        if self.spike.baseline_days == 0 {
            return Err(AppError::Configuration(
                "Spike baseline must cover at least one day".to_string(),
            ));
        }

        // The severity ladder must be strictly ascending for tier
        // classification to be well-defined
        let tiers = [
            self.spike.warning_multiplier,
            self.spike.suspension_multiplier,
            self.spike.critical_multiplier,
        ];
        if tiers.iter().any(|t| *t <= 1.0) || tiers.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::Configuration(
                "Spike severity multipliers must be > 1.0 and strictly ascending".to_string(),
            ));
        }

        if self.overrides.operator_actions_per_hour == 0 {
            return Err(AppError::Configuration(
                "Operator action budget must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
