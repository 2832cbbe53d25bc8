//! Bearer-token authentication and permission authorization.
//!
//! # Components
//!
//! - `jwks` - `KeySource`, the cached, single-flight signing key fetcher
//! - `jwt` - `TokenVerifier`, RS256 signature and claim validation
//! - `permissions` - `Permission` and `PermissionChecker`
//! - `gate` - `AuthGate`, the entry point combining the above
//! - `claims` - verified `Claims`

pub mod claims;
pub mod gate;
pub mod jwks;
pub mod jwt;
pub mod permissions;

pub use claims::Claims;
pub use gate::{extract_bearer_token, AuthGate};
pub use jwks::{KeySource, KeySourceError, SigningKey};
pub use jwt::{RawToken, TokenVerifier, MAX_JWT_SIZE_BYTES};
pub use permissions::{Permission, PermissionChecker, UnknownPermission};
