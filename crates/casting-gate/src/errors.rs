//! Casting gate error types.
//!
//! Every authorization failure is one of a closed set of kinds, and every kind
//! maps to exactly one HTTP status code via the `IntoResponse` impl. Messages
//! returned to clients are generic; details are logged server-side at the
//! point of failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Closed set of authorization failure kinds.
///
/// Used for exhaustive status mapping and as a bounded metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    MissingOrMalformedHeader,
    MalformedToken,
    InvalidSignature,
    ExpiredToken,
    InvalidClaims,
    InsufficientPermission,
    KeySourceUnavailable,
}

impl AuthErrorKind {
    /// Stable snake_case identifier, safe for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorKind::MissingOrMalformedHeader => "missing_or_malformed_header",
            AuthErrorKind::MalformedToken => "malformed_token",
            AuthErrorKind::InvalidSignature => "invalid_signature",
            AuthErrorKind::ExpiredToken => "expired_token",
            AuthErrorKind::InvalidClaims => "invalid_claims",
            AuthErrorKind::InsufficientPermission => "insufficient_permission",
            AuthErrorKind::KeySourceUnavailable => "key_source_unavailable",
        }
    }

    /// HTTP status code for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthErrorKind::MissingOrMalformedHeader
            | AuthErrorKind::MalformedToken
            | AuthErrorKind::InvalidSignature
            | AuthErrorKind::ExpiredToken
            | AuthErrorKind::InvalidClaims => 401,
            AuthErrorKind::InsufficientPermission => 403,
            AuthErrorKind::KeySourceUnavailable => 500,
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization failure returned by the gate.
///
/// `Display` is the client-facing description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    MissingOrMalformedHeader(String),

    #[error("The access token is malformed")]
    MalformedToken,

    #[error("The access token signature could not be verified")]
    InvalidSignature,

    #[error("The access token has expired")]
    ExpiredToken,

    #[error("{0}")]
    InvalidClaims(String),

    /// Carries the missing permission for server-side logs only.
    #[error("Permission not found")]
    InsufficientPermission(String),

    #[error("Authentication service unavailable")]
    KeySourceUnavailable,
}

/// Result of running a request through the gate.
pub type AuthOutcome = Result<crate::auth::Claims, AuthError>;

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::MissingOrMalformedHeader(_) => AuthErrorKind::MissingOrMalformedHeader,
            AuthError::MalformedToken => AuthErrorKind::MalformedToken,
            AuthError::InvalidSignature => AuthErrorKind::InvalidSignature,
            AuthError::ExpiredToken => AuthErrorKind::ExpiredToken,
            AuthError::InvalidClaims(_) => AuthErrorKind::InvalidClaims,
            AuthError::InsufficientPermission(_) => AuthErrorKind::InsufficientPermission,
            AuthError::KeySourceUnavailable => AuthErrorKind::KeySourceUnavailable,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Only a failed key-set fetch is transient. Every other kind means the
    /// request itself is invalid and must not be retried unmodified.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::KeySourceUnavailable)
    }
}

/// Errors surfaced by the service's own routes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    status: u16,
    description: String,
}

fn error_response(status: StatusCode, description: String) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            status: status.as_u16(),
            description,
        },
    };

    let mut response = (status, Json(body)).into_response();

    if status == StatusCode::UNAUTHORIZED {
        if let Ok(header_value) =
            "Bearer realm=\"casting-agency-api\", error=\"invalid_token\"".parse()
        {
            response
                .headers_mut()
                .insert("WWW-Authenticate", header_value);
        }
    }

    response
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.is_retryable() {
            tracing::warn!(target: "casting.errors", kind = %self.kind(), "Authorization could not be evaluated");
        }

        error_response(status, self.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(err) => err.into_response(),
            ApiError::NotFound(resource) => error_response(StatusCode::NOT_FOUND, resource),
        }
    }
}
