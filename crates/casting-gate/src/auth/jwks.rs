//! Key source: fetches and caches the issuer's JSON Web Key Set.
//!
//! The key source fetches the issuer's `/.well-known/jwks.json` document and
//! caches the usable RSA signing keys for a configurable TTL.
//!
//! # Concurrency
//!
//! - Readers load the current [`KeySet`] through an `ArcSwapOption` and never
//!   block. A cached set that is fresh and holds the requested `kid` is served
//!   without I/O.
//! - A refresh builds a complete new `KeySet` and publishes it with a single
//!   atomic swap, so readers see either the old set or the new one.
//! - At most one fetch is in flight. Callers that miss while a fetch is
//!   running join it and all receive its result, success or failure.
//! - The fetch runs on its own task. A caller that times out or is dropped
//!   does not cancel it, and its result is still published.

use crate::observability::metrics;
use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

/// Default cache TTL in seconds (10 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 600;

/// Default timeout for a single JWKS fetch in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Maximum accepted JWKS document size (64KB).
const MAX_JWKS_BODY_BYTES: usize = 64 * 1024;

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (must be "RSA").
    pub kty: String,

    /// Key ID, matched against the token header `kid`.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm (must be "RS256" when present).
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (must be "sig" when present).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// RSA public key able to verify RS256 signatures.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a JWK.
    ///
    /// Returns the reason the key is unusable when it is not an RSA
    /// signature key for RS256 with complete public-key material.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, &'static str> {
        if jwk.kty != "RSA" {
            return Err("key type is not RSA");
        }
        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            return Err("key is not a signature key");
        }
        if jwk.alg.as_deref().is_some_and(|a| a != "RS256") {
            return Err("key algorithm is not RS256");
        }

        let kid = jwk
            .kid
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or("key has no kid")?;
        let n = jwk.n.as_deref().ok_or("key has no modulus")?;
        let e = jwk.e.as_deref().ok_or("key has no exponent")?;

        let decoding_key =
            DecodingKey::from_rsa_components(n, e).map_err(|_| "invalid RSA components")?;

        Ok(Self {
            kid: kid.to_string(),
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// An immutable snapshot of the issuer's signing keys.
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Instant,
    ttl: Duration,
    generation: u64,
}

impl KeySet {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) >= self.ttl
    }

    fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Key resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySourceError {
    /// The JWKS document could not be fetched or parsed. Transient.
    #[error("JWKS unavailable: {0}")]
    Unavailable(String),

    /// A freshly fetched key set has no key with this `kid`.
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),
}

type FetchResult = Result<Arc<KeySet>, KeySourceError>;
type InFlightFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Fetches and caches the issuer's signing keys.
///
/// Construct once and share (`Arc<KeySource>`) between all verifiers.
pub struct KeySource {
    inner: Arc<KeySourceInner>,
}

struct KeySourceInner {
    jwks_url: String,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    current: ArcSwapOption<KeySet>,
    in_flight: Mutex<Option<InFlightFetch>>,
    generation: AtomicU64,
}

impl KeySource {
    /// Create a key source with the default TTL and fetch timeout.
    pub fn new(jwks_url: String) -> Self {
        Self::with_options(
            jwks_url,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        )
    }

    /// Create a key source with a custom cache TTL and fetch timeout.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the issuer's JWKS document
    /// * `cache_ttl` - How long a fetched key set is served before refetching
    /// * `fetch_timeout` - Timeout for a single JWKS request
    pub fn with_options(jwks_url: String, cache_ttl: Duration, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "casting.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            inner: Arc::new(KeySourceInner {
                jwks_url,
                http_client,
                cache_ttl,
                current: ArcSwapOption::empty(),
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Resolve the signing key for `kid`.
    ///
    /// Served from cache when the cached set is fresh and holds `kid`.
    /// Otherwise joins (or starts) the single in-flight fetch.
    ///
    /// # Errors
    ///
    /// - `KeySourceError::Unavailable` if the JWKS fetch failed
    /// - `KeySourceError::UnknownKey` if the freshly fetched set lacks `kid`
    #[instrument(skip_all, fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeySourceError> {
        let observed = self.inner.current.load_full();

        if let Some(key_set) = observed.as_ref() {
            if !key_set.is_expired(Instant::now()) {
                if let Some(key) = key_set.get(kid) {
                    tracing::debug!(target: "casting.auth.jwks", kid = %kid, "JWKS cache hit");
                    return Ok(key);
                }
                tracing::debug!(target: "casting.auth.jwks", kid = %kid, "Key not found in JWKS cache, refreshing");
            }
        }

        let observed_generation = observed.map_or(0, |key_set| key_set.generation);
        let key_set = self.refreshed_key_set(observed_generation).await?;

        key_set.get(kid).ok_or_else(|| {
            tracing::warn!(target: "casting.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
            KeySourceError::UnknownKey(kid.to_string())
        })
    }

    /// Drop the cached key set. The next `resolve` fetches again.
    pub fn invalidate(&self) {
        tracing::info!(target: "casting.auth.jwks", "JWKS cache invalidated");
        self.inner.current.store(None);
        metrics::set_jwks_keys_cached(0);
    }

    /// Whether a key set is currently cached (fresh or not).
    pub fn has_key_set(&self) -> bool {
        self.inner.current.load().is_some()
    }

    /// Number of keys in the cached set.
    pub fn cached_key_count(&self) -> usize {
        self.inner
            .current
            .load()
            .as_ref()
            .map_or(0, |key_set| key_set.len())
    }

    /// Join the in-flight fetch, or start one.
    ///
    /// `observed_generation` is the generation the caller saw before missing.
    /// If a newer set was published since, it is returned without fetching.
    async fn refreshed_key_set(&self, observed_generation: u64) -> FetchResult {
        let fetch = {
            let mut in_flight = self.inner.lock_in_flight();

            if let Some(current) = self.inner.current.load_full() {
                if current.generation > observed_generation {
                    return Ok(current);
                }
            }

            match in_flight.as_ref() {
                Some(fetch) => {
                    tracing::debug!(target: "casting.auth.jwks", "Joining in-flight JWKS fetch");
                    fetch.clone()
                }
                None => {
                    let fetch = self.spawn_fetch();
                    *in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    fn spawn_fetch(&self) -> InFlightFetch {
        let inner = Arc::clone(&self.inner);
        let task_inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let result = task_inner.fetch_key_set().await;
            task_inner.publish(&result);
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(target: "casting.auth.jwks", error = %e, "JWKS fetch task failed");
                    *inner.lock_in_flight() = None;
                    Err(KeySourceError::Unavailable("JWKS fetch task failed".to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl KeySourceInner {
    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlightFetch>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a successful fetch and clear the in-flight slot in one step,
    /// so a caller holding the lock sees either the fetch or its result.
    fn publish(&self, result: &FetchResult) {
        let mut in_flight = self.lock_in_flight();
        if let Ok(key_set) = result {
            self.current.store(Some(Arc::clone(key_set)));
            metrics::set_jwks_keys_cached(key_set.len());
        }
        *in_flight = None;
    }

    #[instrument(skip(self), name = "casting.auth.jwks.fetch")]
    async fn fetch_key_set(&self) -> FetchResult {
        let started = Instant::now();
        let result = self.fetch_key_set_inner().await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_jwks_refresh(status, started.elapsed());

        result
    }

    async fn fetch_key_set_inner(&self) -> FetchResult {
        tracing::debug!(target: "casting.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "casting.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeySourceError::Unavailable(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "casting.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(KeySourceError::Unavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "casting.auth.jwks", error = %e, "Failed to read JWKS response");
            KeySourceError::Unavailable(format!("failed to read body: {}", e))
        })?;

        if body.len() > MAX_JWKS_BODY_BYTES {
            tracing::error!(
                target: "casting.auth.jwks",
                size = body.len(),
                max_size = MAX_JWKS_BODY_BYTES,
                "JWKS response too large"
            );
            return Err(KeySourceError::Unavailable(
                "JWKS response too large".to_string(),
            ));
        }

        let jwks: JwksResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(target: "casting.auth.jwks", error = %e, "Failed to parse JWKS response");
            KeySourceError::Unavailable(format!("invalid JWKS document: {}", e))
        })?;

        let key_set = self.build_key_set(jwks);

        tracing::info!(
            target: "casting.auth.jwks",
            key_count = key_set.len(),
            generation = key_set.generation,
            "JWKS cache refreshed"
        );

        Ok(Arc::new(key_set))
    }

    fn build_key_set(&self, jwks: JwksResponse) -> KeySet {
        let mut keys = HashMap::new();

        for jwk in &jwks.keys {
            match SigningKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                Err(reason) => {
                    tracing::warn!(
                        target: "casting.auth.jwks",
                        kid = ?jwk.kid,
                        reason = reason,
                        "Skipping unusable JWK"
                    );
                }
            }
        }

        KeySet {
            keys,
            fetched_at: Instant::now(),
            ttl: self.cache_ttl,
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}
