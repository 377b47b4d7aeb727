//! Rate limiter types and core data structures

use std::time::Duration;
use thiserror::Error;
use tollgate_config::RateLimitConfig;
use tollgate_redis::RedisError;

use crate::identity::IdentityKind;

/// Token bucket shape for one class of caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Maximum tokens (burst allowance)
    pub capacity: u32,
    /// Time for an empty bucket to refill to `capacity`
    pub window_ms: u64,
}

impl Policy {
    pub const fn new(capacity: u32, window_ms: u64) -> Self {
        Self {
            capacity,
            window_ms,
        }
    }

    /// A policy that can never admit or never refill is a wiring bug, not a
    /// reason to guess.
    pub fn validate(&self) -> Result<(), LimiterError> {
        if self.capacity == 0 {
            return Err(LimiterError::InvalidPolicy(
                "capacity must be at least 1".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(LimiterError::InvalidPolicy(
                "refill window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Tokens regenerated over `elapsed_ms`.
    ///
    /// Multiplies before dividing so whole-token intervals stay exact
    /// (6000ms at 10 tokens per 60000ms is exactly 1.0).
    pub fn refill(&self, elapsed_ms: u64) -> f64 {
        elapsed_ms as f64 * self.capacity as f64 / self.window_ms as f64
    }

    /// Milliseconds until a bucket holding `tokens` reaches one whole token
    pub fn retry_after_ms(&self, tokens: f64) -> u64 {
        let missing = (1.0 - tokens).max(0.0);
        (missing * self.window_ms as f64 / self.capacity as f64).ceil() as u64
    }

    /// How long the store keeps an idle bucket. An idle bucket is full after
    /// `window_ms`, so dropping it later loses nothing.
    pub fn retention_ms(&self) -> u64 {
        self.window_ms.saturating_mul(2)
    }
}

/// Policy per identity kind
#[derive(Debug, Clone, Copy)]
pub struct Policies {
    pub anonymous: Policy,
    pub user: Policy,
}

impl Policies {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            anonymous: Policy::new(config.anonymous_capacity, config.window_ms),
            user: Policy::new(config.user_capacity, config.window_ms),
        }
    }

    pub fn for_kind(&self, kind: IdentityKind) -> &Policy {
        match kind {
            IdentityKind::User => &self.user,
            IdentityKind::Anonymous => &self.anonymous,
        }
    }
}

/// Persisted token bucket record (Redis hash fields `tokens` and `last`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    /// Current number of tokens, always within `[0, capacity]`
    pub tokens: f64,
    /// Instant `tokens` was last correct (Unix timestamp in milliseconds)
    pub last_refill_ms: u64,
}

impl BucketState {
    /// Lazily created bucket: full, refilled as of `now_ms`
    pub fn full(policy: &Policy, now_ms: u64) -> Self {
        Self {
            tokens: policy.capacity as f64,
            last_refill_ms: now_ms,
        }
    }
}

/// Result of one atomic refill + debit on the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketOutcome {
    /// State written back to the store
    pub state: BucketState,
    /// Whether a token was debited
    pub admitted: bool,
}

/// Admission decision handed to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Whole tokens left after this request
    pub remaining: u32,
    /// Zero when allowed
    pub retry_after_ms: u64,
}

impl Decision {
    pub fn from_outcome(outcome: &BucketOutcome, policy: &Policy) -> Self {
        let remaining = outcome.state.tokens.floor().max(0.0) as u32;
        if outcome.admitted {
            Self {
                allowed: true,
                remaining,
                retry_after_ms: 0,
            }
        } else {
            Self {
                allowed: false,
                remaining,
                retry_after_ms: policy.retry_after_ms(outcome.state.tokens),
            }
        }
    }
}

/// Bucket store failures. All of them are recoverable: the gate fails open.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket store unavailable: {0}")]
    Unavailable(#[from] RedisError),

    #[error("bucket store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("malformed bucket store reply: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Timeout(_) => "timeout",
            StoreError::Malformed(_) => "malformed",
        }
    }
}

#[derive(Debug, Error)]
pub enum LimiterError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid rate limit policy: {0}")]
    InvalidPolicy(String),
}
