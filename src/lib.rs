//! # Tollgate Server
//!
//! Request admission for an HTTP API: every request is attributed to a user
//! (valid bearer token) or to its network origin, and debited from that
//! identity's token bucket in a shared store before any route runs.
//!
//! - [`identity`]: bearer token → [`identity::Identity`]
//! - [`rate_limit`]: token bucket math, bucket stores, [`rate_limit::RateLimiter`]
//! - [`routes`]: router assembly and the admission gate middleware

pub mod auth;
pub mod clock;
pub mod context;
pub mod db;
pub mod error;
pub mod identity;
pub mod rate_limit;
pub mod routes;
pub mod utils;

pub use context::AppContext;
pub use routes::create_router;
pub use tollgate_config::Config;
