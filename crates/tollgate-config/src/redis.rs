// ============================================================================
// Redis Configuration
// ============================================================================

use crate::constants::{DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT};

/// Redis key prefixes configuration
#[derive(Clone, Debug)]
pub struct RedisKeyPrefixes {
    /// Prefix for token bucket hashes: "rate:{user|ip}:{id}"
    pub rate: String,
}

impl Default for RedisKeyPrefixes {
    fn default() -> Self {
        Self {
            rate: "rate:".to_string(),
        }
    }
}

impl RedisKeyPrefixes {
    pub(crate) fn from_env() -> Self {
        Self {
            rate: std::env::var("REDIS_KEY_PREFIX_RATE").unwrap_or_else(|_| "rate:".to_string()),
        }
    }
}

/// REDIS_URL wins; otherwise the URL is assembled from REDIS_HOST / REDIS_PORT
pub(crate) fn redis_url_from_env() -> String {
    if let Ok(url) = std::env::var("REDIS_URL")
        && !url.trim().is_empty()
    {
        return url;
    }

    let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| DEFAULT_REDIS_HOST.to_string());
    let port = std::env::var("REDIS_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_REDIS_PORT);

    format!("redis://{}:{}", host, port)
}
