//! Redis client implementation with connection management

use crate::Result;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::collections::HashMap;

/// Redis client with automatic reconnection
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// PING - Round trip to check the server is reachable
    pub async fn ping(&mut self) -> Result<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    // ============================================================================
    // Key Operations
    // ============================================================================

    /// DEL - Delete one or more keys
    pub async fn del<K>(&mut self, keys: K) -> Result<i64>
    where
        K: redis::ToRedisArgs + Send + Sync,
    {
        self.conn.del(keys).await
    }

    /// PTTL - Get time to live in milliseconds
    pub async fn pttl(&mut self, key: &str) -> Result<i64> {
        self.conn.pttl(key).await
    }

    // ============================================================================
    // Hash Operations
    // ============================================================================

    /// HGETALL - All fields of a hash (empty map when the key is missing)
    pub async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        self.conn.hgetall(key).await
    }

    /// HSET - Set several hash fields at once
    pub async fn hset_multiple(&mut self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        self.conn.hset_multiple(key, fields).await
    }

    // ============================================================================
    // Lua Scripts
    // ============================================================================

    /// Run a Lua script atomically (EVALSHA, falling back to EVAL on NOSCRIPT)
    pub async fn invoke_script<T: redis::FromRedisValue>(
        &mut self,
        script: &redis::Script,
        keys: &[&str],
        args: &[String],
    ) -> Result<T> {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg);
        }
        invocation.invoke_async(&mut self.conn).await
    }
}
