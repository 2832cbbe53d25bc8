//! Builder patterns for test tokens
//!
//! Provides a fluent API for signed access tokens plus helpers for the
//! malformed, unsigned and tampered tokens that rejection tests need.

use crate::crypto_fixtures::TestKeypair;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for access token claims.
///
/// Defaults to a valid token for `issuer`/`audience` with no permissions,
/// expiring in one hour.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new(&jwks.issuer(), "casting-agency")
///     .for_user("auth0|alice")
///     .with_permissions(&["get:movies", "get:actors"])
///     .expires_in(3600)
///     .sign(&key);
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("sub".to_string(), json!("auth0|test-user"));
        claims.insert("aud".to_string(), json!(audience));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 3600));
        claims.insert("azp".to_string(), json!("test-client"));
        claims.insert("permissions".to_string(), json!([]));
        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the `permissions` claim
    pub fn with_permissions(self, permissions: &[&str]) -> Self {
        self.with_claim("permissions", json!(permissions))
    }

    /// Set `aud` to an array
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!(Utc::now().timestamp() + seconds))
    }

    /// Set or replace any claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// The claims as a JSON value
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign with RS256 under the keypair's `kid`
    pub fn sign(&self, key: &TestKeypair) -> String {
        self.sign_with_kid(key, &key.kid)
    }

    /// Sign with RS256 using `key` but advertising a different `kid`
    pub fn sign_with_kid(&self, key: &TestKeypair, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, &self.claims(), &key.encoding_key()).expect("RS256 signing should succeed")
    }

    /// Sign with HS256 using `secret` as the HMAC key
    pub fn sign_hs256(&self, secret: &[u8], kid: &str) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &self.claims(), &EncodingKey::from_secret(secret))
            .expect("HS256 signing should succeed")
    }

    /// An `alg: none` token with an empty signature
    pub fn unsigned(&self, kid: &str) -> String {
        let header = json!({"alg": "none", "typ": "JWT", "kid": kid});
        format!(
            "{}.{}.",
            encode_segment(&header),
            encode_segment(&self.claims())
        )
    }
}

/// Base64url-encode a JSON value as a token segment
pub fn encode_segment(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string().as_bytes())
}

/// Flip one bit in the decoded payload and re-encode it
pub fn tamper_payload(token: &str) -> String {
    flip_bit_in_segment(token, 1)
}

/// Flip one bit in the decoded signature and re-encode it
pub fn tamper_signature(token: &str) -> String {
    flip_bit_in_segment(token, 2)
}

fn flip_bit_in_segment(token: &str, index: usize) -> String {
    let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
    assert_eq!(segments.len(), 3, "expected a three-segment token");

    let mut bytes = URL_SAFE_NO_PAD
        .decode(&segments[index])
        .expect("segment should be base64url");
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x01;
    segments[index] = URL_SAFE_NO_PAD.encode(&bytes);

    segments.join(".")
}
