//! Token bucket rate limiting
//!
//! - `types`: policies, bucket state, decisions and errors
//! - `bucket`: the refill + debit computation
//! - `store`: Redis and in-memory bucket stores
//! - `limiter`: per-request entry point used by the admission gate

mod bucket;
mod limiter;
mod store;
mod types;

pub use bucket::refill_and_take;
pub use limiter::RateLimiter;
pub use store::{BucketStore, InMemoryBucketStore, RedisBucketStore};
pub use types::{
    BucketOutcome, BucketState, Decision, LimiterError, Policies, Policy, StoreError,
};
