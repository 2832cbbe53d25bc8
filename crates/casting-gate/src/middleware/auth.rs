//! Authorization middleware for protected routes.
//!
//! Runs the [`AuthGate`] for the route's required permission and injects the
//! verified claims into request extensions, where handlers pick them up with
//! `Extension<Claims>`.

use crate::auth::{AuthGate, Claims, Permission};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authorization middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Shared gate (one key source for the whole service).
    pub gate: Arc<AuthGate>,

    /// Permission every route behind this middleware requires.
    pub permission: Permission,
}

/// Middleware that authorizes the request for `state.permission`.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with WWW-Authenticate header if the header or token is invalid
/// - 403 if the token lacks the permission
/// - 500 if the signing keys could not be fetched
/// - Otherwise continues to the handler with claims in extensions
#[instrument(skip_all, name = "casting.middleware.auth", fields(permission = %state.permission))]
pub async fn require_permission(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // A non-ASCII header value is treated as present but malformed.
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|h| h.to_str().unwrap_or_default());

    let claims = state.gate.authorize(header, state.permission).await?;

    tracing::debug!(target: "casting.middleware.auth", "Claims attached to request");
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Put every route of `router` behind the gate for `permission`.
///
/// Only routes already added to `router` are protected, so merge public
/// routes afterwards:
///
/// ```rust,ignore
/// let movies = protect(
///     Router::new().route("/movies", get(list_movies)),
///     Permission::GetMovies,
///     gate.clone(),
/// );
/// let app = Router::new().route("/", get(index)).merge(movies);
/// ```
pub fn protect<S>(router: Router<S>, permission: Permission, gate: Arc<AuthGate>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        AuthState { gate, permission },
        require_permission,
    ))
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the verified claims from request extensions.
    ///
    /// Returns `None` if the authorization middleware was not applied.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get};
    use std::time::Duration;
    use tower::ServiceExt;

    fn gate() -> Arc<AuthGate> {
        let key_source = Arc::new(crate::auth::KeySource::new(
            "http://127.0.0.1:1/.well-known/jwks.json".to_string(),
        ));
        Arc::new(AuthGate::new(
            key_source,
            "https://casting.example.com/".to_string(),
            "casting-agency".to_string(),
            Duration::ZERO,
        ))
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_claims_ext_without_middleware() {
        let req = axum::extract::Request::new(Body::empty());
        assert!(req.claims().is_none());
    }

    #[tokio::test]
    async fn test_protect_rejects_missing_header() {
        let app = protect(
            Router::new().route("/movies", get(|| async { "movies" })),
            Permission::GetMovies,
            gate(),
        );

        let response = app
            .oneshot(
                axum::extract::Request::builder()
                    .uri("/movies")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("WWW-Authenticate").is_some());
    }

    #[tokio::test]
    async fn test_protect_leaves_later_routes_public() {
        let app = protect(
            Router::new().route("/movies", get(|| async { "movies" })),
            Permission::GetMovies,
            gate(),
        )
        .route("/", get(|| async { "ok" }));

        let response = app
            .oneshot(
                axum::extract::Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
