// ============================================================================
// Health and Metrics Routes
// ============================================================================
//
// Endpoints:
// - GET /health - Liveness plus bucket store reachability
// - GET /metrics - Prometheus metrics
//
// ============================================================================

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::AppError;

/// GET /health
///
/// Always 200: with the store down the gate fails open, so the server keeps
/// serving. The store state is reported for operators.
pub async fn health_check(
    State(app_context): State<Arc<AppContext>>,
) -> Result<impl IntoResponse, AppError> {
    let store_up = app_context.limiter.store_healthy().await;
    if !store_up {
        tracing::warn!("Health check: bucket store unreachable");
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "store": if store_up { "up" } else { "down" },
        })),
    ))
}

/// GET /metrics
/// Prometheus metrics endpoint
pub async fn metrics() -> Result<impl IntoResponse, AppError> {
    match tollgate_metrics::gather_metrics() {
        Ok(metrics_data) => Ok((
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            metrics_data,
        )),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain")],
                "Internal Server Error".to_string(),
            ))
        }
    }
}
