// ============================================================================
// Axum Middleware
// ============================================================================
//
// Middleware for request processing:
// - request_logging: Log all incoming requests
// - admission_gate: Resolve the caller and enforce its token bucket
// - panic_response: Turn a handler panic into the standard 500 body
//
// ============================================================================

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tollgate_metrics::{ADMISSIONS_TOTAL, STORE_FAILURES_TOTAL};

use crate::context::AppContext;
use crate::error::AppError;
use crate::identity::RequestCredential;
use crate::rate_limit::LimiterError;

/// Body message of every 429 response
pub const DENY_MESSAGE: &str = "Too many requests per minute";

/// Request logging middleware
pub async fn request_logging(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    tracing::debug!(
        method = %method,
        path = %path,
        "Incoming request"
    );

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

/// Admission gate
///
/// Runs ahead of every route (including the 404 fallback):
/// 1. Resolves the caller to a user or anonymous identity
/// 2. Debits one token from that identity's bucket
/// 3. Rejects with 429 + `Retry-After` when the bucket is empty
///
/// A bucket store failure admits the request unaccounted. The resolved
/// identity is stored in request extensions for [`CallerIdentity`].
///
/// [`CallerIdentity`]: crate::routes::extractors::CallerIdentity
pub async fn admission_gate(
    State(ctx): State<Arc<AppContext>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let credential =
        RequestCredential::from_parts(req.headers(), peer_ip, ctx.config.trust_forwarded_headers);

    let identity = ctx.resolver.resolve(&credential).await;
    let kind = identity.kind();

    if ctx.config.rate_limit.enabled {
        let key = identity.bucket_key(&ctx.config.redis_key_prefixes.rate);
        let policy = ctx.policies.for_kind(kind);

        match ctx.limiter.check_and_consume(&key, policy).await {
            Ok(decision) if decision.allowed => {
                ADMISSIONS_TOTAL
                    .with_label_values(&[kind.as_str(), "allowed"])
                    .inc();
            }
            Ok(decision) => {
                ADMISSIONS_TOTAL
                    .with_label_values(&[kind.as_str(), "denied"])
                    .inc();
                tracing::warn!(
                    identity = %kind.as_str(),
                    caller_hash = %identity.log_safe(&ctx.config.logging.hash_salt),
                    path = %req.uri().path(),
                    retry_after_ms = decision.retry_after_ms,
                    "Rate limit exceeded"
                );
                return Err(AppError::too_many_requests(
                    DENY_MESSAGE,
                    decision.retry_after_ms,
                ));
            }
            Err(LimiterError::Store(e)) => {
                ADMISSIONS_TOTAL
                    .with_label_values(&[kind.as_str(), "fail_open"])
                    .inc();
                STORE_FAILURES_TOTAL.with_label_values(&[e.reason()]).inc();
                // Fail open, the request proceeds unaccounted
                tracing::warn!(
                    error = %e,
                    identity = %kind.as_str(),
                    "Rate limit check failed, allowing request"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Handler for `CatchPanicLayer`
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::internal(format!("handler panicked: {}", detail)).into_response()
}
