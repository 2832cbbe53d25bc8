//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /v1/health
///
/// Liveness only: the issuer is not contacted. `key_set` reports whether a
/// signing key set has been fetched yet.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "key_set": "cached"
/// }
/// ```
#[instrument(skip_all, name = "casting.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let key_set = if state.gate.key_source().has_key_set() {
        "cached"
    } else {
        "empty"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        key_set: key_set.to_string(),
    })
}
