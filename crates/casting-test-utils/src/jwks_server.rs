//! Mock JWKS endpoint
//!
//! Wraps a wiremock `MockServer` serving `/.well-known/jwks.json`, so tests
//! can control the published keys and count how often they were fetched.

use crate::crypto_fixtures::{jwks_document, TestKeypair};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the JWKS document on the mock issuer.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock issuer publishing a JWKS document.
///
/// # Example
/// ```rust,ignore
/// let key = TestKeypair::primary("key-1");
/// let jwks = TestJwks::start(&[&key]).await;
/// let key_source = KeySource::new(jwks.url());
/// ```
pub struct TestJwks {
    server: MockServer,
}

impl TestJwks {
    /// Serve a JWKS document containing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        Self::start_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys))).await
    }

    /// Serve `keys`, answering each request only after `delay`.
    pub async fn start_with_delay(keys: &[&TestKeypair], delay: Duration) -> Self {
        Self::start_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(keys))
                .set_delay(delay),
        )
        .await
    }

    /// Answer every JWKS request with `status` and an empty body.
    pub async fn start_failing(status: u16) -> Self {
        Self::start_with(ResponseTemplate::new(status)).await
    }

    /// Answer every JWKS request with `template`.
    pub async fn start_with(template: ResponseTemplate) -> Self {
        let server = MockServer::start().await;
        let jwks = Self { server };
        jwks.respond_with(template).await;
        jwks
    }

    /// Replace the published keys.
    ///
    /// Also clears the recorded requests, so `fetch_count` restarts at zero.
    pub async fn publish(&self, keys: &[&TestKeypair]) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Replace the response. Clears the recorded requests.
    pub async fn respond_with(&self, template: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// URL of the JWKS document.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Issuer identifier in Auth0 form (base URL with trailing slash).
    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    /// Number of JWKS requests received since start or the last reset.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == JWKS_PATH)
                    .count()
            })
    }
}
