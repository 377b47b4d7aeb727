//! Token Bucket
//!
//! Continuous refill: a bucket regains `capacity` tokens per `window_ms`,
//! never holds more than `capacity`, and each admitted request removes one
//! token. Time always advances through the refill step, so the refilled state
//! is written back on the deny path too.
//!
//! [`refill_and_take`] is the reference computation. The in-memory store runs
//! it under a per-key lock; the Redis store runs the same steps in Lua.

use super::types::{BucketOutcome, BucketState, Policy};

pub fn refill_and_take(current: Option<BucketState>, policy: &Policy, now_ms: u64) -> BucketOutcome {
    let capacity = policy.capacity as f64;
    let state = current.unwrap_or_else(|| BucketState::full(policy, now_ms));

    // A clock behind `last` refills nothing
    let elapsed_ms = now_ms.saturating_sub(state.last_refill_ms);

    // max/min also scrub NaN and records written under a larger capacity
    let mut tokens = (state.tokens.max(0.0) + policy.refill(elapsed_ms)).min(capacity);

    let admitted = tokens >= 1.0;
    if admitted {
        tokens -= 1.0;
    }

    BucketOutcome {
        state: BucketState {
            tokens,
            last_refill_ms: state.last_refill_ms.max(now_ms),
        },
        admitted,
    }
}
