// ============================================================================
// Tollgate Config - Centralized configuration management
// ============================================================================
//
// Loads every knob of the admission server from environment variables
// (optionally seeded from a .env file) with defaults.
//
// ============================================================================

mod constants;
mod logging;
mod rate_limit;
mod redis;

// Re-export all public types
pub use logging::LoggingConfig;
pub use rate_limit::{RateLimitConfig, StoreBackend};
pub use redis::RedisKeyPrefixes;

use anyhow::{Context, Result};
use constants::*;

/// Main configuration structure for the admission server
#[derive(Clone, Debug)]
pub struct Config {
    /// User directory (Postgres)
    pub database_url: String,
    /// Shared bucket store endpoint
    pub redis_url: String,

    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,

    /// Expected `iss` claim; tokens are not issuer-checked when unset
    pub jwt_issuer: Option<String>,

    /// Lifetime of tokens minted by `AuthManager::create_token`
    pub access_token_ttl_hours: i64,

    pub port: u16,
    pub bind_address: String,

    /// Honour X-Forwarded-For / X-Real-IP when deriving the caller origin.
    /// Only enable behind a reverse proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,

    pub rust_log: String,

    // Sub-configurations
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub redis_key_prefixes: RedisKeyPrefixes,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        // Load sub-configurations
        let logging = LoggingConfig::from_env()?;
        let rate_limit = RateLimitConfig::from_env().context("Invalid rate limit configuration")?;
        let redis_key_prefixes = RedisKeyPrefixes::from_env();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: redis::redis_url_from_env(),

            jwt_secret,
            jwt_issuer: std::env::var("JWT_ISSUER")
                .ok()
                .filter(|issuer| !issuer.trim().is_empty()),

            access_token_ttl_hours: std::env::var("ACCESS_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_HOURS),

            port,
            bind_address: format!("[::]:{}", port),

            trust_forwarded_headers: std::env::var("TRUST_FORWARDED_HEADERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),

            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            logging,
            rate_limit,
            redis_key_prefixes,
        })
    }
}
