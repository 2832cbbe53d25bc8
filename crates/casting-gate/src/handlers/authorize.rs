//! Permission check handler.
//!
//! Lets a reverse proxy delegate authorization for a CRUD route to the gate.

use crate::auth::Permission;
use crate::errors::ApiError;
use crate::models::AuthorizeResponse;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /v1/authorize/{permission}
///
/// Runs the gate for `permission` against the request's `Authorization`
/// header.
///
/// ## Response
///
/// - 200 with the token's subject, permissions, audiences and expiry
/// - 404 if `permission` is not an API permission
/// - 401/403/500 per the gate's error mapping
///
/// ```json
/// {
///   "sub": "auth0|5f1a...",
///   "permissions": ["get:actors", "get:movies"],
///   "aud": ["castingagency"],
///   "exp": 1893456000
/// }
/// ```
#[instrument(skip_all, name = "casting.handlers.authorize", fields(permission = %permission))]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Path(permission): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let permission = permission.parse::<Permission>().map_err(|e| {
        tracing::debug!(target: "casting.handlers.authorize", "Unknown permission requested");
        ApiError::NotFound(e.to_string())
    })?;

    let header = headers
        .get(AUTHORIZATION)
        .map(|h| h.to_str().unwrap_or_default());

    let claims = state.gate.authorize(header, permission).await?;

    Ok(Json(AuthorizeResponse {
        sub: claims.subject().to_string(),
        permissions: claims.permissions().iter().cloned().collect(),
        aud: claims.audience().to_vec(),
        exp: claims.expires_at(),
    }))
}
