//! Caller identity resolution
//!
//! Every request resolves to exactly one [`Identity`]. A valid bearer token
//! whose subject still exists in the user directory yields a user identity;
//! everything else (no token, bad signature, expired, unknown subject, lookup
//! failure) yields an anonymous identity keyed by network origin. Resolution
//! never fails.

use crate::auth::AuthManager;
use crate::db::{Role, UserDirectory};
use crate::utils::{extract_client_ip, log_safe_id};
use axum::http::HeaderMap;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User { id: Uuid, role: Role },
    Anonymous { origin: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    User,
    Anonymous,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::User => "user",
            IdentityKind::Anonymous => "anonymous",
        }
    }
}

impl Identity {
    pub fn kind(&self) -> IdentityKind {
        match self {
            Identity::User { .. } => IdentityKind::User,
            Identity::Anonymous { .. } => IdentityKind::Anonymous,
        }
    }

    /// Store key for this caller's bucket. User and origin keys live in
    /// separate namespaces, so a user id can never collide with an address.
    pub fn bucket_key(&self, prefix: &str) -> String {
        match self {
            Identity::User { id, .. } => format!("{}user:{}", prefix, id),
            Identity::Anonymous { origin } => format!("{}ip:{}", prefix, origin),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::User { id, .. } => Some(*id),
            Identity::Anonymous { .. } => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Identity::User { role, .. } => Some(*role),
            Identity::Anonymous { .. } => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User { .. })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_instructor(&self) -> bool {
        self.has_role(Role::Instructor)
    }

    pub fn is_student(&self) -> bool {
        self.has_role(Role::Student)
    }

    /// Whether the caller is the user `id` (for "own resource" checks)
    pub fn is_self(&self, id: &Uuid) -> bool {
        self.user_id().as_ref() == Some(id)
    }

    /// Salted short hash of the identity key, for logs
    pub fn log_safe(&self, salt: &str) -> String {
        log_safe_id(&self.bucket_key(""), salt)
    }
}

/// Credential material taken from one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCredential {
    pub bearer: Option<String>,
    pub origin: String,
}

impl RequestCredential {
    pub fn from_parts(headers: &HeaderMap, peer_ip: Option<IpAddr>, trust_forwarded: bool) -> Self {
        Self {
            bearer: crate::auth::bearer_token(headers).map(str::to_string),
            origin: extract_client_ip(headers, peer_ip, trust_forwarded),
        }
    }
}

pub struct IdentityResolver {
    auth: Arc<AuthManager>,
    users: Arc<dyn UserDirectory>,
    hash_salt: String,
}

impl IdentityResolver {
    pub fn new(auth: Arc<AuthManager>, users: Arc<dyn UserDirectory>, hash_salt: String) -> Self {
        Self {
            auth,
            users,
            hash_salt,
        }
    }

    pub async fn resolve(&self, credential: &RequestCredential) -> Identity {
        let anonymous = || Identity::Anonymous {
            origin: credential.origin.clone(),
        };

        let Some(token) = credential.bearer.as_deref() else {
            return anonymous();
        };

        let user_id = match self.auth.verify_token(token).and_then(|claims| claims.user_id()) {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected, treating caller as anonymous");
                return anonymous();
            }
        };

        match self.users.lookup_user_by_id(&user_id).await {
            Ok(Some(user)) => Identity::User {
                id: user.id,
                role: user.role,
            },
            Ok(None) => {
                tracing::debug!(
                    user_hash = %log_safe_id(&user_id.to_string(), &self.hash_salt),
                    "Token subject not found, treating caller as anonymous"
                );
                anonymous()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_hash = %log_safe_id(&user_id.to_string(), &self.hash_salt),
                    "User lookup failed, treating caller as anonymous"
                );
                anonymous()
            }
        }
    }
}
