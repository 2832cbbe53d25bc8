//! HTTP integration tests.
//!
//! Drives the service router and a sample protected router with real
//! RS256 tokens against a mocked JWKS endpoint.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    response::Response,
    routing::{delete, get},
    Extension, Router,
};
use casting_gate::auth::{AuthGate, Claims, KeySource, Permission};
use casting_gate::middleware::protect;
use casting_gate::routes::{build_routes, init_metrics_recorder, AppState};
use casting_test_utils::{TestJwks, TestKeypair, TestTokenBuilder};
use http_body_util::BodyExt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower::ServiceExt;

/// Global metrics handle for test routers
static TEST_METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> =
    OnceLock::new();

fn get_test_metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

const AUDIENCE: &str = "casting-agency";

struct TestApp {
    gate: Arc<AuthGate>,
    jwks: TestJwks,
    key: TestKeypair,
}

impl TestApp {
    async fn start() -> Self {
        let key = TestKeypair::primary("key-1");
        let jwks = TestJwks::start(&[&key]).await;
        let gate = Arc::new(AuthGate::new(
            Arc::new(KeySource::new(jwks.url())),
            jwks.issuer(),
            AUDIENCE.to_string(),
            Duration::ZERO,
        ));

        Self { gate, jwks, key }
    }

    fn service_router(&self) -> Router {
        let state = Arc::new(AppState {
            gate: Arc::clone(&self.gate),
        });
        build_routes(state, get_test_metrics_handle())
    }

    /// A small CRUD-shaped router with one public and two protected routes.
    fn movies_router(&self) -> Router {
        let read = protect(
            Router::new().route(
                "/movies",
                get(|Extension(claims): Extension<Claims>| async move {
                    claims.subject().to_string()
                }),
            ),
            Permission::GetMovies,
            Arc::clone(&self.gate),
        );
        let remove = protect(
            Router::new().route("/movies/:id", delete(|| async { StatusCode::NO_CONTENT })),
            Permission::DeleteMovie,
            Arc::clone(&self.gate),
        );

        Router::new()
            .route("/", get(|| async { "Casting Agency" }))
            .merge(read)
            .merge(remove)
    }

    fn bearer(&self, permissions: &[&str]) -> String {
        let token = TestTokenBuilder::new(&self.jwks.issuer(), AUDIENCE)
            .for_user("auth0|producer")
            .with_permissions(permissions)
            .sign(&self.key);
        format!("Bearer {}", token)
    }
}

async fn send(router: Router, method: &str, uri: &str, authorization: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// Protected routes
// =============================================================================

#[tokio::test]
async fn test_protected_route_without_header_returns_401() {
    let app = TestApp::start().await;

    let response = send(app.movies_router(), "GET", "/movies", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("WWW-Authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(challenge.starts_with("Bearer"));

    let body = body_json(response).await;
    assert_eq!(body["error"]["status"], 401);
    assert_eq!(
        body["error"]["description"],
        "Authorization header is expected"
    );
}

#[tokio::test]
async fn test_protected_route_with_permission_reaches_handler() {
    let app = TestApp::start().await;
    let header = app.bearer(&["get:movies"]);

    let response = send(app.movies_router(), "GET", "/movies", Some(&header)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "auth0|producer");
}

#[tokio::test]
async fn test_protected_route_without_permission_returns_403() {
    let app = TestApp::start().await;
    let header = app.bearer(&["get:movies"]);

    let response = send(app.movies_router(), "DELETE", "/movies/1", Some(&header)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get("WWW-Authenticate").is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"]["status"], 403);
    assert_eq!(body["error"]["description"], "Permission not found");
}

#[tokio::test]
async fn test_expired_token_returns_401() {
    let app = TestApp::start().await;
    let token = TestTokenBuilder::new(&app.jwks.issuer(), AUDIENCE)
        .with_permissions(&["get:movies"])
        .expires_in(-60)
        .sign(&app.key);

    let response = send(
        app.movies_router(),
        "GET",
        "/movies",
        Some(&format!("Bearer {}", token)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["description"], "The access token has expired");
}

#[tokio::test]
async fn test_public_route_needs_no_token() {
    let app = TestApp::start().await;

    let response = send(app.movies_router(), "GET", "/", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.jwks.fetch_count().await, 0);
}

#[tokio::test]
async fn test_unavailable_key_source_returns_500() {
    let jwks = TestJwks::start_failing(503).await;
    let key = TestKeypair::primary("key-1");
    let gate = Arc::new(AuthGate::new(
        Arc::new(KeySource::new(jwks.url())),
        jwks.issuer(),
        AUDIENCE.to_string(),
        Duration::ZERO,
    ));
    let router = protect(
        Router::new().route("/actors", get(|| async { "actors" })),
        Permission::GetActors,
        gate,
    );
    let token = TestTokenBuilder::new(&jwks.issuer(), AUDIENCE)
        .with_permissions(&["get:actors"])
        .sign(&key);

    let response = send(router, "GET", "/actors", Some(&format!("Bearer {}", token))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["status"], 500);
}

// =============================================================================
// Service endpoints
// =============================================================================

#[tokio::test]
async fn test_authorize_endpoint_returns_claim_summary() {
    let app = TestApp::start().await;
    let header = app.bearer(&["create:movie", "get:movies"]);

    let response = send(
        app.service_router(),
        "GET",
        "/v1/authorize/create:movie",
        Some(&header),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sub"], "auth0|producer");
    assert_eq!(body["permissions"], serde_json::json!(["create:movie", "get:movies"]));
    assert_eq!(body["aud"], serde_json::json!([AUDIENCE]));
    assert!(body["exp"].is_i64());
}

#[tokio::test]
async fn test_authorize_endpoint_unknown_permission_returns_404() {
    let app = TestApp::start().await;
    let header = app.bearer(&["get:movies"]);

    let response = send(
        app.service_router(),
        "GET",
        "/v1/authorize/launch:rockets",
        Some(&header),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["status"], 404);
    assert_eq!(app.jwks.fetch_count().await, 0);
}

#[tokio::test]
async fn test_authorize_endpoint_missing_permission_returns_403() {
    let app = TestApp::start().await;
    let header = app.bearer(&["get:actors"]);

    let response = send(
        app.service_router(),
        "GET",
        "/v1/authorize/delete:actor",
        Some(&header),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_reports_key_set_state() {
    let app = TestApp::start().await;

    let response = send(app.service_router(), "GET", "/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["key_set"], "empty");

    let header = app.bearer(&["get:movies"]);
    let response = send(app.service_router(), "GET", "/v1/authorize/get:movies", Some(&header)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(app.service_router(), "GET", "/v1/health", None).await;
    let body = body_json(response).await;
    assert_eq!(body["key_set"], "cached");
}

/// Test that health endpoint returns JSON content type.
#[tokio::test]
async fn test_health_returns_json() -> Result<(), anyhow::Error> {
    let app = TestApp::start().await;

    let response = app
        .service_router()
        .oneshot(Request::builder().uri("/v1/health").body(Body::empty())?)
        .await?;

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());

    assert!(
        content_type.is_some_and(|ct| ct.contains("application/json")),
        "Expected application/json content type, got {:?}",
        content_type
    );

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = TestApp::start().await;

    let response = send(app.service_router(), "GET", "/v1/nonexistent", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_decisions() {
    let app = TestApp::start().await;
    let router = app.service_router();
    let header = app.bearer(&["get:movies"]);

    let response = send(router.clone(), "GET", "/v1/authorize/get:movies", Some(&header)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(router, "GET", "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(
        text.contains("casting_auth_decisions_total"),
        "metrics output missing decisions counter:\n{}",
        text
    );
}
