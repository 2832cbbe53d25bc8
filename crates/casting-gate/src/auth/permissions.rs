//! Endpoint permissions and the permission check.

use crate::auth::claims::Claims;
use crate::errors::AuthError;
use std::fmt;
use std::str::FromStr;

/// Permission required by an API endpoint.
///
/// The wire form (`get:movies`, `create:actor`, ...) is what the issuer puts
/// into the `permissions` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    GetMovies,
    CreateMovie,
    UpdateMovie,
    DeleteMovie,
    GetActors,
    CreateActor,
    UpdateActor,
    DeleteActor,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::GetMovies,
        Permission::CreateMovie,
        Permission::UpdateMovie,
        Permission::DeleteMovie,
        Permission::GetActors,
        Permission::CreateActor,
        Permission::UpdateActor,
        Permission::DeleteActor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::GetMovies => "get:movies",
            Permission::CreateMovie => "create:movie",
            Permission::UpdateMovie => "update:movie",
            Permission::DeleteMovie => "delete:movie",
            Permission::GetActors => "get:actors",
            Permission::CreateActor => "create:actor",
            Permission::UpdateActor => "update:actor",
            Permission::DeleteActor => "delete:actor",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown permission string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Enforces that verified claims carry a required permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionChecker;

impl PermissionChecker {
    /// Exact set membership. No wildcards, prefixes or hierarchy.
    pub fn check(&self, claims: &Claims, required: Permission) -> Result<(), AuthError> {
        if claims.has_permission(required.as_str()) {
            Ok(())
        } else {
            tracing::debug!(target: "casting.auth.permissions", required = %required, "Required permission missing from token");
            Err(AuthError::InsufficientPermission(required.to_string()))
        }
    }
}
