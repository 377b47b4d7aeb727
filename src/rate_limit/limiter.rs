//! Rate limiter service
//!
//! Validates the policy, reads the clock once per request and bounds the store
//! round trip with a timeout. Store failures are returned to the caller, which
//! decides whether to fail open.

use super::store::BucketStore;
use super::types::{Decision, LimiterError, Policy, StoreError};
use crate::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tollgate_metrics::STORE_LATENCY_SECONDS;
use tracing::debug;

pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>, store_timeout: Duration) -> Self {
        Self {
            store,
            clock,
            store_timeout,
        }
    }

    /// Refill the bucket at `key`, take one token if available and persist the
    /// new state, all as one atomic step on the store.
    pub async fn check_and_consume(
        &self,
        key: &str,
        policy: &Policy,
    ) -> Result<Decision, LimiterError> {
        policy.validate()?;

        let now_ms = self.clock.now_ms();
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.store_timeout,
            self.store.read_modify_write(key, policy, now_ms),
        )
        .await;
        STORE_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());

        let outcome = result.map_err(|_| StoreError::Timeout(self.store_timeout))??;
        let decision = Decision::from_outcome(&outcome, policy);

        debug!(
            allowed = decision.allowed,
            remaining = decision.remaining,
            retry_after_ms = decision.retry_after_ms,
            "Rate limit checked"
        );

        Ok(decision)
    }

    pub async fn store_healthy(&self) -> bool {
        matches!(
            tokio::time::timeout(self.store_timeout, self.store.ping()).await,
            Ok(Ok(()))
        )
    }
}
