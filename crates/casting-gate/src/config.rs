//! Casting gate configuration.
//!
//! Configuration is loaded from environment variables.

use crate::auth::jwks::{DEFAULT_CACHE_TTL_SECONDS, DEFAULT_FETCH_TIMEOUT_SECONDS};
use crate::auth::jwt::MAX_CLOCK_SKEW;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// The only accepted token signing algorithm.
pub const SUPPORTED_ALGORITHM: &str = "RS256";

/// Allowed range for the JWKS fetch timeout in seconds.
pub const FETCH_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=60;

/// Casting gate configuration.
#[derive(Clone)]
pub struct Config {
    /// Expected `iss` claim, e.g. "https://tenant.auth0.com/".
    pub issuer: String,

    /// Audience that must appear in the `aud` claim.
    pub audience: String,

    /// URL of the issuer's JWKS document
    /// (default: "{issuer}/.well-known/jwks.json").
    pub jwks_url: String,

    /// How long a fetched key set is cached (default: 600).
    pub jwks_cache_ttl_seconds: u64,

    /// Timeout for a single JWKS fetch (default: 10).
    pub jwks_fetch_timeout_seconds: u64,

    /// Tolerance applied to `exp` (default: 0).
    pub jwt_clock_skew_seconds: u64,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Connection drain period on shutdown (default: 0).
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("bind_address", &self.bind_address)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer = required(vars, "AUTH_ISSUER")?;
        let audience = required(vars, "AUTH_AUDIENCE")?;

        let jwks_url = vars
            .get("AUTH_JWKS_URL")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| default_jwks_url(&issuer));

        if let Some(algorithm) = vars.get("JWT_ALGORITHM") {
            if algorithm != SUPPORTED_ALGORITHM {
                return Err(ConfigError::UnsupportedAlgorithm(format!(
                    "JWT_ALGORITHM must be {}, got '{}'",
                    SUPPORTED_ALGORITHM, algorithm
                )));
            }
        }

        let jwks_cache_ttl_seconds =
            parse_u64(vars, "JWKS_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)
                .map_err(ConfigError::InvalidCacheTtl)?;
        if jwks_cache_ttl_seconds == 0 {
            return Err(ConfigError::InvalidCacheTtl(
                "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let jwks_fetch_timeout_seconds = parse_u64(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT_SECONDS,
        )
        .map_err(ConfigError::InvalidFetchTimeout)?;
        if !FETCH_TIMEOUT_RANGE.contains(&jwks_fetch_timeout_seconds) {
            return Err(ConfigError::InvalidFetchTimeout(format!(
                "JWKS_FETCH_TIMEOUT_SECONDS must be between {} and {} seconds, got {}",
                FETCH_TIMEOUT_RANGE.start(),
                FETCH_TIMEOUT_RANGE.end(),
                jwks_fetch_timeout_seconds
            )));
        }

        let jwt_clock_skew_seconds = parse_u64(vars, "JWT_CLOCK_SKEW_SECONDS", 0)
            .map_err(ConfigError::InvalidJwtClockSkew)?;
        if jwt_clock_skew_seconds > MAX_CLOCK_SKEW.as_secs() {
            return Err(ConfigError::InvalidJwtClockSkew(format!(
                "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                jwt_clock_skew_seconds
            )));
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let drain_seconds =
            parse_u64(vars, "DRAIN_SECONDS", 0).map_err(ConfigError::InvalidDrainSeconds)?;

        Ok(Config {
            issuer,
            audience,
            jwks_url,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwt_clock_skew_seconds,
            bind_address,
            drain_seconds,
        })
    }
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_u64(vars: &HashMap<String, String>, key: &str, default: u64) -> Result<u64, String> {
    match vars.get(key) {
        Some(value_str) => value_str.parse().map_err(|e| {
            format!(
                "{} must be a valid non-negative integer, got '{}': {}",
                key, value_str, e
            )
        }),
        None => Ok(default),
    }
}

/// Auth0-style JWKS location for an issuer.
fn default_jwks_url(issuer: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
}
