//! Bucket Store Backends
//!
//! Shared token bucket state keyed by identity:
//! - Redis for multi-instance deployments (atomic via a server-side Lua script)
//! - In-memory for development and single-instance deployments
//!
//! Each backend guarantees that the refill + debit + write-back for one key is
//! atomic with respect to every other request on the same key. Different keys
//! never wait on each other.

use super::bucket::refill_and_take;
use super::types::{BucketOutcome, BucketState, Policy, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tollgate_redis::{RedisClient, Script};
use tracing::debug;

/// Trait for bucket store backends
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Atomically refill the bucket at `key` up to `now_ms`, take one token if
    /// available, and persist the result. A missing bucket starts full.
    async fn read_modify_write(
        &self,
        key: &str,
        policy: &Policy,
        now_ms: u64,
    ) -> Result<BucketOutcome, StoreError>;

    /// Reachability probe for health reporting
    async fn ping(&self) -> Result<(), StoreError>;
}

// Mirrors `refill_and_take`. Numbers travel as strings so fractional tokens
// survive the Lua to RESP integer conversion.
const REFILL_AND_TAKE_SCRIPT: &str = r"
local capacity = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])
local retention_ms = tonumber(ARGV[4])

local fields = redis.call('HMGET', KEYS[1], 'tokens', 'last')
local tokens = tonumber(fields[1])
local last = tonumber(fields[2])
if tokens == nil or last == nil then
    tokens = capacity
    last = now_ms
end

local elapsed = math.max(0, now_ms - last)
tokens = math.min(capacity, math.max(0, tokens) + elapsed * capacity / window_ms)

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end
last = math.max(last, now_ms)

redis.call('HSET', KEYS[1], 'tokens', tostring(tokens), 'last', tostring(last))
redis.call('PEXPIRE', KEYS[1], retention_ms)
return {allowed, tostring(tokens), tostring(last)}
";

/// Redis bucket store backend
///
/// Each bucket is a hash with fields `tokens` and `last`, expiring after
/// [`Policy::retention_ms`] of inactivity.
pub struct RedisBucketStore {
    client: RedisClient,
    script: Script,
}

impl RedisBucketStore {
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            script: Script::new(REFILL_AND_TAKE_SCRIPT),
        }
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    async fn read_modify_write(
        &self,
        key: &str,
        policy: &Policy,
        now_ms: u64,
    ) -> Result<BucketOutcome, StoreError> {
        // ConnectionManager is a cheap multiplexed handle
        let mut client = self.client.clone();

        let (allowed, tokens, last): (i64, String, String) = client
            .invoke_script(
                &self.script,
                &[key],
                &[
                    policy.capacity.to_string(),
                    policy.window_ms.to_string(),
                    now_ms.to_string(),
                    policy.retention_ms().to_string(),
                ],
            )
            .await?;

        let tokens: f64 = tokens
            .parse()
            .map_err(|_| StoreError::Malformed(format!("tokens={}", tokens)))?;
        let last: f64 = last
            .parse()
            .map_err(|_| StoreError::Malformed(format!("last={}", last)))?;

        debug!(key = %key, allowed = allowed, tokens = tokens, "Bucket updated");

        Ok(BucketOutcome {
            state: BucketState {
                tokens,
                last_refill_ms: last as u64,
            },
            admitted: allowed == 1,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        client.ping().await?;
        Ok(())
    }
}

struct Slot {
    state: Option<BucketState>,
    expires_at_ms: u64,
}

impl Slot {
    fn live_state(&self, now_ms: u64) -> Option<BucketState> {
        if now_ms >= self.expires_at_ms {
            None
        } else {
            self.state
        }
    }
}

/// In-memory bucket store backend
///
/// The outer map lock is only held to find or create a slot; the
/// read-modify-write runs under that slot's own mutex.
#[derive(Default)]
pub struct InMemoryBucketStore {
    slots: RwLock<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &str) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }

        let mut slots = self.slots.write().await;
        slots
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Slot {
                    state: None,
                    expires_at_ms: 0,
                }))
            })
            .clone()
    }

    /// Current persisted state, ignoring expiry
    pub async fn get(&self, key: &str) -> Option<BucketState> {
        let slot = self.slots.read().await.get(key).cloned()?;
        let guard = slot.lock().await;
        guard.state
    }

    /// Drop buckets idle past their retention. Returns the number removed.
    pub async fn purge_expired(&self, now_ms: u64) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        // A slot handed out by `slot()` is about to be written, keep it even
        // if it is unlocked right now
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => guard.live_state(now_ms).is_some(),
                Err(_) => true,
            }
        });
        before - slots.len()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn read_modify_write(
        &self,
        key: &str,
        policy: &Policy,
        now_ms: u64,
    ) -> Result<BucketOutcome, StoreError> {
        let slot = self.slot(key).await;
        let mut guard = slot.lock().await;

        let outcome = refill_and_take(guard.live_state(now_ms), policy, now_ms);
        guard.state = Some(outcome.state);
        guard.expires_at_ms = now_ms.saturating_add(policy.retention_ms());

        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
