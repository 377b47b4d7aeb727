// ============================================================================
// Caller Introspection
// ============================================================================
//
// - GET /whoami - The identity the admission gate resolved for this request
//
// ============================================================================

use axum::Json;
use serde_json::{Value, json};

use crate::identity::Identity;
use crate::routes::extractors::CallerIdentity;

pub async fn whoami(CallerIdentity(caller): CallerIdentity) -> Json<Value> {
    let body = match &caller {
        Identity::User { id, role } => json!({
            "authenticated": true,
            "user_id": id,
            "role": role,
        }),
        Identity::Anonymous { origin } => json!({
            "authenticated": false,
            "origin": origin,
        }),
    };
    Json(body)
}
