//! The authorization gate.
//!
//! Single entry point for request authorization: header extraction, token
//! verification, then the permission check. Every decision is logged and
//! counted by outcome.

use crate::auth::jwks::KeySource;
use crate::auth::jwt::{RawToken, TokenVerifier};
use crate::auth::permissions::{Permission, PermissionChecker};
use crate::config::Config;
use crate::errors::{AuthError, AuthOutcome};
use crate::observability::metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

const BEARER_PREFIX: &str = "Bearer ";

/// Runs extraction, verification and the permission check for a request.
pub struct AuthGate {
    key_source: Arc<KeySource>,
    verifier: TokenVerifier,
    checker: PermissionChecker,
}

impl AuthGate {
    /// Create a gate over an existing key source.
    pub fn new(
        key_source: Arc<KeySource>,
        issuer: String,
        audience: String,
        clock_skew: Duration,
    ) -> Self {
        let verifier = TokenVerifier::new(Arc::clone(&key_source), issuer, audience, clock_skew);

        Self {
            key_source,
            verifier,
            checker: PermissionChecker,
        }
    }

    /// Build the key source and gate from configuration.
    pub fn from_config(config: &Config) -> Self {
        let key_source = Arc::new(KeySource::with_options(
            config.jwks_url.clone(),
            Duration::from_secs(config.jwks_cache_ttl_seconds),
            Duration::from_secs(config.jwks_fetch_timeout_seconds),
        ));

        Self::new(
            key_source,
            config.issuer.clone(),
            config.audience.clone(),
            Duration::from_secs(config.jwt_clock_skew_seconds),
        )
    }

    pub fn key_source(&self) -> &Arc<KeySource> {
        &self.key_source
    }

    /// Authorize a request.
    ///
    /// `header` is the raw `Authorization` header value, if any. On success
    /// the verified claims are returned for the caller to hand to its handler.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`]; see [`AuthError::status_code`] for the HTTP mapping.
    #[instrument(skip_all, name = "casting.auth.gate", fields(permission = %required))]
    pub async fn authorize(&self, header: Option<&str>, required: Permission) -> AuthOutcome {
        let started = Instant::now();

        let outcome = self.evaluate(header, required).await;

        match &outcome {
            Ok(_) => {
                tracing::debug!(target: "casting.auth.gate", permission = %required, "Request authorized");
                metrics::record_authorization("authorized", started.elapsed());
            }
            Err(e) => {
                tracing::debug!(
                    target: "casting.auth.gate",
                    permission = %required,
                    error_code = %e.kind(),
                    "Request denied"
                );
                metrics::record_authorization(e.kind().as_str(), started.elapsed());
            }
        }

        outcome
    }

    async fn evaluate(&self, header: Option<&str>, required: Permission) -> AuthOutcome {
        let token = extract_bearer_token(header)?;
        let claims = self.verifier.verify(&token).await?;
        self.checker.check(&claims, required)?;
        Ok(claims)
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly `Bearer <token>`: case-sensitive scheme, one
/// space, and a non-empty token without whitespace.
pub fn extract_bearer_token(header: Option<&str>) -> Result<RawToken, AuthError> {
    let header = header.ok_or_else(|| {
        AuthError::MissingOrMalformedHeader("Authorization header is expected".to_string())
    })?;

    let token = header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
        AuthError::MissingOrMalformedHeader(
            "Authorization header must start with \"Bearer\"".to_string(),
        )
    })?;

    if token.is_empty() {
        return Err(AuthError::MissingOrMalformedHeader(
            "Token not found".to_string(),
        ));
    }

    if token.chars().any(char::is_whitespace) {
        return Err(AuthError::MissingOrMalformedHeader(
            "Authorization header must be bearer token".to_string(),
        ));
    }

    Ok(RawToken::new(token))
}
