// ============================================================================
// Rate Limit Configuration
// ============================================================================

use anyhow::Result;

use crate::constants::{
    DEFAULT_ANONYMOUS_CAPACITY, DEFAULT_REFILL_WINDOW_MS, DEFAULT_STORE_TIMEOUT_MS,
    DEFAULT_USER_CAPACITY,
};

/// Where token bucket state lives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Shared Redis hash per identity key (multi-process deployments)
    Redis,
    /// Process-local map (single instance, development, tests)
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => anyhow::bail!(
                "RATE_LIMIT_STORE_BACKEND must be 'redis' or 'memory', got '{}'",
                other
            ),
        }
    }
}

/// Admission policy knobs
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Whether the admission gate enforces limits at all
    pub enabled: bool,
    /// Bucket capacity for callers identified only by network origin
    pub anonymous_capacity: u32,
    /// Bucket capacity for authenticated users (must exceed `anonymous_capacity`)
    pub user_capacity: u32,
    /// Time for an empty bucket to refill completely
    pub window_ms: u64,
    /// Upper bound for a single store round trip; exceeding it fails open
    pub store_timeout_ms: u64,
    pub store_backend: StoreBackend,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            anonymous_capacity: DEFAULT_ANONYMOUS_CAPACITY,
            user_capacity: DEFAULT_USER_CAPACITY,
            window_ms: DEFAULT_REFILL_WINDOW_MS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            store_backend: StoreBackend::Redis,
        }
    }
}

impl RateLimitConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let config = Self {
            enabled: std::env::var("RATE_LIMIT_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true), // Enabled by default
            anonymous_capacity: std::env::var("RATE_LIMIT_CAPACITY_IP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ANONYMOUS_CAPACITY),
            user_capacity: std::env::var("RATE_LIMIT_CAPACITY_USER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_USER_CAPACITY),
            window_ms: std::env::var("RATE_LIMIT_WINDOW_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REFILL_WINDOW_MS),
            store_timeout_ms: std::env::var("RATE_LIMIT_STORE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_STORE_TIMEOUT_MS),
            store_backend: match std::env::var("RATE_LIMIT_STORE_BACKEND") {
                Ok(value) => StoreBackend::parse(&value)?,
                Err(_) => StoreBackend::Redis,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject policies the limiter cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.anonymous_capacity == 0 {
            anyhow::bail!("RATE_LIMIT_CAPACITY_IP must be at least 1");
        }
        if self.user_capacity <= self.anonymous_capacity {
            anyhow::bail!(
                "RATE_LIMIT_CAPACITY_USER ({}) must be greater than RATE_LIMIT_CAPACITY_IP ({})",
                self.user_capacity,
                self.anonymous_capacity
            );
        }
        if self.window_ms == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_MS must be greater than zero");
        }
        if self.store_timeout_ms == 0 {
            anyhow::bail!("RATE_LIMIT_STORE_TIMEOUT_MS must be greater than zero");
        }
        Ok(())
    }
}
