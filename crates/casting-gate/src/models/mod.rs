//! Response bodies of the casting gate's own endpoints.

use serde::{Deserialize, Serialize};

/// Health check response.
///
/// Returned by the `/v1/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status.
    pub status: String,

    /// Signing key cache state ("cached" or "empty").
    pub key_set: String,
}

/// Authorization check response.
///
/// Returned by `/v1/authorize/{permission}` when the token grants the
/// permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Subject the token was issued to.
    pub sub: String,

    /// All permissions granted by the token.
    pub permissions: Vec<String>,

    /// Token audiences.
    pub aud: Vec<String>,

    /// Token expiration timestamp.
    pub exp: i64,
}
