// ============================================================================
// Axum Extractors
// ============================================================================
//
// - CallerIdentity: the identity the admission gate resolved for this request
//
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::identity::Identity;

/// Extractor for the caller identity resolved by the admission gate
///
/// Usage:
/// ```rust,ignore
/// async fn handler(CallerIdentity(caller): CallerIdentity) -> impl IntoResponse {
///     if caller.is_admin() {
///         // ...
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CallerIdentity)
            .ok_or_else(|| AppError::internal("route is not behind the admission gate"))
    }
}
