//! Access token verification.
//!
//! Verifies RS256 bearer tokens against the issuer's signing keys and checks
//! the standard claims.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only RS256 is accepted; the header `alg` is checked before any key lookup
//! - Claims are only decoded after the signature has been verified
//! - Expiration is validated first, with a configurable clock skew tolerance

use crate::auth::claims::Claims;
use crate::auth::jwks::{KeySource, KeySourceError};
use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Maximum allowed token size in bytes (8KB).
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Maximum allowed clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

const ACCEPTED_ALGORITHM: &str = "RS256";

const INCORRECT_ISSUER_OR_AUDIENCE: &str =
    "Incorrect claims. Please check the audience and issuer";

/// Untrusted token as taken from the `Authorization` header.
///
/// Redacted in `Debug` output.
#[derive(Clone)]
pub struct RawToken(SecretString);

impl RawToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawToken([REDACTED])")
    }
}

impl From<String> for RawToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

const INCORRECT_CLAIMS: &str = "Incorrect claims. Please check the token claims";

/// Payload as sent by the issuer, before validation.
///
/// Claims stay untyped until [`TokenVerifier::validate_claims_at`] checks
/// them one at a time, so an ill-typed claim cannot mask an earlier failure.
#[derive(Debug)]
pub(crate) struct RawClaims(Map<String, Value>);

impl RawClaims {
    pub(crate) fn from_payload(payload: Map<String, Value>) -> Self {
        Self(payload)
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// Verifies bearer tokens for one issuer and audience.
pub struct TokenVerifier {
    key_source: Arc<KeySource>,
    issuer: String,
    audience: String,
    clock_skew_seconds: i64,
}

impl TokenVerifier {
    /// Create a new token verifier.
    ///
    /// # Arguments
    ///
    /// * `key_source` - Shared source of the issuer's signing keys
    /// * `issuer` - Expected `iss` claim
    /// * `audience` - Audience that must appear in the `aud` claim
    /// * `clock_skew` - Tolerance applied to `exp`; capped at [`MAX_CLOCK_SKEW`]
    pub fn new(
        key_source: Arc<KeySource>,
        issuer: String,
        audience: String,
        clock_skew: Duration,
    ) -> Self {
        let clock_skew_seconds = i64::try_from(clock_skew.min(MAX_CLOCK_SKEW).as_secs())
            .unwrap_or(0);

        Self {
            key_source,
            issuer,
            audience,
            clock_skew_seconds,
        }
    }

    /// Verify a token and return its claims.
    ///
    /// # Checks
    ///
    /// 1. Size limit, three segments, decodable header
    /// 2. Header `alg` is RS256 and `kid` is present
    /// 3. Signing key resolved by `kid`
    /// 4. RS256 signature over `header.payload`
    /// 5. `exp`, `iss`, `aud`, `permissions`, `sub`
    ///
    /// # Errors
    ///
    /// - `AuthError::MalformedToken` - oversized, wrong shape, undecodable
    /// - `AuthError::InvalidSignature` - wrong algorithm, unknown key, bad signature
    /// - `AuthError::ExpiredToken` - `exp` is past, beyond the clock skew
    /// - `AuthError::InvalidClaims` - wrong issuer/audience, missing or ill-typed claims
    /// - `AuthError::KeySourceUnavailable` - signing keys could not be fetched
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &RawToken) -> Result<Claims, AuthError> {
        let token = token.expose();

        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "casting.auth.jwt",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum"
            );
            return Err(AuthError::MalformedToken);
        }

        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
            tracing::debug!(
                target: "casting.auth.jwt",
                segments = segments.len(),
                "Token rejected: expected three segments"
            );
            return Err(AuthError::MalformedToken);
        };

        let header = decode_json_object(header_b64).ok_or_else(|| {
            tracing::debug!(target: "casting.auth.jwt", "Token rejected: undecodable header");
            AuthError::MalformedToken
        })?;

        let alg = header.get("alg").and_then(Value::as_str);
        if alg != Some(ACCEPTED_ALGORITHM) {
            tracing::debug!(target: "casting.auth.jwt", alg = ?alg, "Token rejected: disallowed algorithm");
            return Err(AuthError::InvalidSignature);
        }

        let kid = header
            .get("kid")
            .and_then(Value::as_str)
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token rejected: missing kid");
                AuthError::InvalidSignature
            })?;

        let signing_key = self.key_source.resolve(kid).await.map_err(|e| match e {
            KeySourceError::UnknownKey(_) => {
                tracing::debug!(target: "casting.auth.jwt", kid = %kid, "Token rejected: unknown signing key");
                AuthError::InvalidSignature
            }
            KeySourceError::Unavailable(_) => AuthError::KeySourceUnavailable,
        })?;

        let signing_input_len = header_b64.len() + 1 + payload_b64.len();
        let signing_input = token.get(..signing_input_len).unwrap_or_default();

        let signature_valid = jsonwebtoken::crypto::verify(
            signature_b64,
            signing_input.as_bytes(),
            signing_key.decoding_key(),
            Algorithm::RS256,
        )
        .unwrap_or_else(|e| {
            tracing::debug!(target: "casting.auth.jwt", error = %e, "Signature could not be checked");
            false
        });

        if !signature_valid {
            tracing::debug!(target: "casting.auth.jwt", kid = %kid, "Token rejected: signature mismatch");
            return Err(AuthError::InvalidSignature);
        }

        let payload = decode_json_object(payload_b64).ok_or_else(|| {
            tracing::debug!(target: "casting.auth.jwt", "Token rejected: undecodable payload");
            AuthError::MalformedToken
        })?;

        let claims = self.validate_claims_at(
            RawClaims::from_payload(payload),
            chrono::Utc::now().timestamp(),
        )?;

        tracing::debug!(target: "casting.auth.jwt", kid = %kid, "Token verified successfully");
        Ok(claims)
    }

    /// Validate decoded claims against a given current time.
    ///
    /// Split from `verify` so that expiry handling is deterministic in tests.
    pub(crate) fn validate_claims_at(&self, raw: RawClaims, now: i64) -> Result<Claims, AuthError> {
        // `exp` is a NumericDate and may carry a fractional part.
        let exp = match raw.get("exp") {
            None | Some(Value::Null) => {
                tracing::debug!(target: "casting.auth.jwt", "Token rejected: missing exp");
                return Err(AuthError::InvalidClaims("Token has no expiration".to_string()));
            }
            Some(value) => value.as_f64().ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token rejected: ill-typed exp");
                AuthError::InvalidClaims(INCORRECT_CLAIMS.to_string())
            })?,
        };

        let cutoff = now.saturating_sub(self.clock_skew_seconds) as f64;
        if exp <= cutoff {
            tracing::debug!(
                target: "casting.auth.jwt",
                exp = exp,
                now = now,
                clock_skew_seconds = self.clock_skew_seconds,
                "Token rejected: expired"
            );
            return Err(AuthError::ExpiredToken);
        }

        let iss = match raw.get("iss").and_then(Value::as_str) {
            Some(iss) if iss == self.issuer => iss.to_string(),
            other => {
                tracing::debug!(target: "casting.auth.jwt", iss = ?other, "Token rejected: unexpected issuer");
                return Err(AuthError::InvalidClaims(
                    INCORRECT_ISSUER_OR_AUDIENCE.to_string(),
                ));
            }
        };

        let aud = raw.get("aud").and_then(parse_audience).unwrap_or_default();
        if !aud.iter().any(|a| *a == self.audience) {
            tracing::debug!(target: "casting.auth.jwt", aud = ?aud, "Token rejected: audience mismatch");
            return Err(AuthError::InvalidClaims(
                INCORRECT_ISSUER_OR_AUDIENCE.to_string(),
            ));
        }

        let permissions = raw
            .get("permissions")
            .and_then(parse_permissions)
            .ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token rejected: permissions missing or ill-typed");
                AuthError::InvalidClaims("Permissions not included in token".to_string())
            })?;

        let sub = raw
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token rejected: missing sub");
                AuthError::InvalidClaims("Token has no subject".to_string())
            })?;

        let iat = match raw.get("iat") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_f64().map(|t| t.floor() as i64).ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token rejected: ill-typed iat");
                AuthError::InvalidClaims(INCORRECT_CLAIMS.to_string())
            })?),
        };

        let azp = match raw.get("azp") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_str().map(str::to_string).ok_or_else(|| {
                tracing::debug!(target: "casting.auth.jwt", "Token rejected: ill-typed azp");
                AuthError::InvalidClaims(INCORRECT_CLAIMS.to_string())
            })?),
        };

        Ok(Claims::new(
            iss,
            sub,
            aud,
            exp.floor() as i64,
            iat,
            azp,
            permissions,
        ))
    }
}

/// Parse the `aud` claim: a single string or an array of strings.
fn parse_audience(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(aud) => Some(vec![aud.clone()]),
        Value::Array(auds) => auds
            .iter()
            .map(|a| a.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Decode a base64url segment holding a JSON object.
fn decode_json_object(segment: &str) -> Option<Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Parse the `permissions` claim: an array where every element is a string.
fn parse_permissions(value: &Value) -> Option<BTreeSet<String>> {
    value
        .as_array()?
        .iter()
        .map(|p| p.as_str().map(str::to_string))
        .collect()
}
