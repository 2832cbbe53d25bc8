//! # Casting Test Utilities
//!
//! Shared test utilities for the casting gate.
//!
//! This crate provides:
//! - Fixed RSA keypairs (`TestKeypair`)
//! - Signed and deliberately broken test tokens (`TestTokenBuilder`)
//! - A mocked issuer JWKS endpoint (`TestJwks`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casting_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestKeypair::primary("key-1");
//!     let jwks = TestJwks::start(&[&key]).await;
//!
//!     let token = TestTokenBuilder::new(&jwks.issuer(), "casting-agency")
//!         .with_permissions(&["get:movies"])
//!         .sign(&key);
//!
//!     // Point a KeySource at jwks.url() and verify `token`.
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;
