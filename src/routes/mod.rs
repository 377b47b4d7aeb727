// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Main router assembly and middleware
// - health.rs: Health check and metrics endpoints
// - whoami.rs: Caller introspection
// - extractors.rs: Custom Axum extractors (CallerIdentity)
// - middleware.rs: Request logging, admission gate, panic handler
//
// ============================================================================

pub mod extractors;
mod health;
pub mod middleware;
mod whoami;

use axum::{Router, http::Uri, routing::get};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::error::AppError;

/// Create the main application router
///
/// `api` carries the resource routes protected by the gate. Every route,
/// including health, metrics and the 404 fallback, passes the admission gate.
pub fn create_router(app_context: Arc<AppContext>, api: Router<Arc<AppContext>>) -> Router {
    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/whoami", get(whoami::whoami))
        .merge(api)
        .fallback(not_found)
        // Apply middleware (order matters - last added runs first)
        .layer(axum::middleware::from_fn_with_state(
            app_context.clone(),
            middleware::admission_gate,
        ))
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(TraceLayer::new_for_http())
        .with_state(app_context)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Requested resource {} does not exist", uri))
}
