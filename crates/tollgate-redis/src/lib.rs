//! # Tollgate Redis
//!
//! Low-level Redis client for the tollgate admission server.
//!
//! ## Design Principles
//!
//! - **No business logic** - Pure infrastructure layer
//! - **No dependencies** on other tollgate-* crates
//! - **Generic operations** - Hashes, expiry and Lua scripts
//!
//! ## Example
//!
//! ```rust,no_run
//! use tollgate_redis::RedisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RedisClient::connect("redis://localhost:6379").await?;
//!
//!     client.ping().await?;
//!     let bucket = client.hgetall("rate:ip:203.0.113.7").await?;
//!     println!("{:?}", bucket);
//!
//!     Ok(())
//! }
//! ```

mod client;

pub use client::RedisClient;

// Re-export commonly used types
pub use redis::{RedisError, Script};

/// Result type for Redis operations
pub type Result<T> = std::result::Result<T, RedisError>;
