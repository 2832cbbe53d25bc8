//! Middleware for the casting gate.
//!
//! # Components
//!
//! - `auth` - Permission-checking middleware for protected routes

pub mod auth;

pub use auth::{protect, require_permission, AuthState, ClaimsExt};
