use crate::auth::AuthManager;
use crate::clock::Clock;
use crate::db::UserDirectory;
use crate::identity::IdentityResolver;
use crate::rate_limit::{BucketStore, Policies, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tollgate_config::Config;

/// Application context containing shared dependencies
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub resolver: Arc<IdentityResolver>,
    pub limiter: Arc<RateLimiter>,
    pub policies: Policies,
}

impl AppContext {
    /// Wires the resolver and limiter from their collaborators
    pub fn new(
        config: Arc<Config>,
        auth_manager: Arc<AuthManager>,
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = IdentityResolver::new(auth_manager, users, config.logging.hash_salt.clone());
        let limiter = RateLimiter::new(
            store,
            clock,
            Duration::from_millis(config.rate_limit.store_timeout_ms),
        );

        Self {
            policies: Policies::from_config(&config.rate_limit),
            resolver: Arc::new(resolver),
            limiter: Arc::new(limiter),
            config,
        }
    }
}
