//! Casting Gate Library
//!
//! Bearer-token authentication and permission authorization for the Casting
//! Agency API. Every protected request runs through one pipeline:
//!
//! ```text
//! Authorization header -> AuthGate -> TokenVerifier -> KeySource (JWKS)
//!                                  -> PermissionChecker -> Claims
//! ```
//!
//! The CRUD API mounts the gate on its routes with [`middleware::protect`];
//! the `casting-gate` binary also exposes it over HTTP for forward-auth
//! deployments.
//!
//! # Modules
//!
//! - `auth` - Key source, token verifier, permission checker and the gate
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Axum authorization middleware
//! - `models` - Response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
