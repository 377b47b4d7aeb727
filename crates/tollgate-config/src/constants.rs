// ============================================================================
// Configuration Constants
// ============================================================================

// Default port values
pub(crate) const DEFAULT_PORT: u16 = 8000;

// Default Redis endpoint parts (used when REDIS_URL is not set)
pub(crate) const DEFAULT_REDIS_HOST: &str = "redis";
pub(crate) const DEFAULT_REDIS_PORT: u16 = 6379;

// Access token TTL: 24 hours
pub(crate) const DEFAULT_ACCESS_TOKEN_TTL_HOURS: i64 = 24;

// Token bucket defaults: 10 anonymous / 30 authenticated requests per minute
pub(crate) const DEFAULT_ANONYMOUS_CAPACITY: u32 = 10;
pub(crate) const DEFAULT_USER_CAPACITY: u32 = 30;
pub(crate) const DEFAULT_REFILL_WINDOW_MS: u64 = 60_000;

// Upper bound for one bucket store round trip
pub(crate) const DEFAULT_STORE_TIMEOUT_MS: u64 = 250;
