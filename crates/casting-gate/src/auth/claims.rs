//! Verified token claims.
//!
//! A `Claims` value only exists once a token has passed signature and claim
//! validation. Fields are private and exposed through accessors so a value
//! cannot be altered after verification. The `sub` field is redacted in
//! Debug output to prevent exposure in logs.

use std::collections::BTreeSet;
use std::fmt;

/// Claims of a verified access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Claims {
    iss: String,
    sub: String,
    aud: Vec<String>,
    exp: i64,
    iat: Option<i64>,
    azp: Option<String>,
    permissions: BTreeSet<String>,
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("azp", &self.azp)
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl Claims {
    pub(crate) fn new(
        iss: String,
        sub: String,
        aud: Vec<String>,
        exp: i64,
        iat: Option<i64>,
        azp: Option<String>,
        permissions: BTreeSet<String>,
    ) -> Self {
        Self {
            iss,
            sub,
            aud,
            exp,
            iat,
            azp,
            permissions,
        }
    }

    /// Issuer (`iss`).
    pub fn issuer(&self) -> &str {
        &self.iss
    }

    /// Subject (`sub`), the user or client the token was issued to.
    pub fn subject(&self) -> &str {
        &self.sub
    }

    /// Audiences (`aud`). A single-string audience is a one-element slice.
    pub fn audience(&self) -> &[String] {
        &self.aud
    }

    /// Expiration timestamp (Unix epoch seconds).
    pub fn expires_at(&self) -> i64 {
        self.exp
    }

    /// Issued-at timestamp (Unix epoch seconds), if present.
    pub fn issued_at(&self) -> Option<i64> {
        self.iat
    }

    /// Authorized party (`azp`), if present.
    pub fn authorized_party(&self) -> Option<&str> {
        self.azp.as_deref()
    }

    /// Granted permissions. May be empty.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Check if the token grants a permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_claims(permissions: &[&str]) -> Claims {
        Claims::new(
            "https://casting.example.com/".to_string(),
            "auth0|secret-user-id".to_string(),
            vec!["casting-agency".to_string()],
            1_900_000_000,
            Some(1_899_990_000),
            Some("client-abc".to_string()),
            permissions.iter().map(|p| p.to_string()).collect(),
        )
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let claims = sample_claims(&["get:movies"]);

        let debug_str = format!("{:?}", claims);

        assert!(
            !debug_str.contains("secret-user-id"),
            "Debug output should not contain actual sub value"
        );
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("get:movies"));
    }

    #[test]
    fn test_claims_has_permission() {
        let claims = sample_claims(&["get:movies", "get:actors"]);

        assert!(claims.has_permission("get:movies"));
        assert!(claims.has_permission("get:actors"));
        assert!(!claims.has_permission("delete:movie"));
        assert!(!claims.has_permission("get:movie")); // No prefix matching
    }

    #[test]
    fn test_claims_empty_permissions() {
        let claims = sample_claims(&[]);

        assert!(claims.permissions().is_empty());
        assert!(!claims.has_permission("get:movies"));
    }

    #[test]
    fn test_claims_accessors() {
        let claims = sample_claims(&["update:actor"]);

        assert_eq!(claims.issuer(), "https://casting.example.com/");
        assert_eq!(claims.subject(), "auth0|secret-user-id");
        assert_eq!(claims.audience(), &["casting-agency".to_string()]);
        assert_eq!(claims.expires_at(), 1_900_000_000);
        assert_eq!(claims.issued_at(), Some(1_899_990_000));
        assert_eq!(claims.authorized_party(), Some("client-abc"));
    }
}
