//! Authentication and permission types for the domain layer.
//!
//! These types describe who is on the other end of a connection. They have
//! **no provider dependencies**: any identity provider can populate them via
//! the `SessionValidator` port, and the permission engine reads them through
//! the `PermissionChecker` port.

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ScopeId, UserId};

/// Platform-wide role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    #[default]
    User,
    Admin,
}

/// Role a user holds inside one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    #[default]
    Member,
    Admin,
}

/// Snapshot of what a connected user may see, taken when they connect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSnapshot {
    pub user_id: Option<UserId>,
    pub role: SystemRole,
    pub memberships: BTreeMap<ScopeId, MembershipRole>,
}

impl PermissionSnapshot {
    /// Creates a snapshot for a regular user with no memberships.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            role: SystemRole::User,
            memberships: BTreeMap::new(),
        }
    }

    /// Adds a membership to the snapshot.
    pub fn with_membership(mut self, scope_id: ScopeId, role: MembershipRole) -> Self {
        self.memberships.insert(scope_id, role);
        self
    }

    /// Sets the system role.
    pub fn with_role(mut self, role: SystemRole) -> Self {
        self.role = role;
        self
    }

    pub fn is_system_admin(&self) -> bool {
        self.role == SystemRole::Admin
    }

    /// Returns the user's role in a scope, if they belong to it.
    pub fn membership_in(&self, scope_id: &ScopeId) -> Option<MembershipRole> {
        self.memberships.get(scope_id).copied()
    }

    /// Whether the user may observe the given scope at all.
    pub fn can_access_scope(&self, scope_id: &ScopeId) -> bool {
        self.is_system_admin() || self.memberships.contains_key(scope_id)
    }
}

/// Per-session secret that cache tokens are bound to.
///
/// Wrapped in `SecretString` so it never lands in logs.
#[derive(Clone)]
pub struct SessionCredential(SecretString);

impl SessionCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCredential([REDACTED])")
    }
}

/// Authenticated session extracted from a validated access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user_id: UserId,
    pub credential: SessionCredential,
    pub permissions: PermissionSnapshot,
}

impl AuthenticatedSession {
    pub fn new(user_id: UserId, credential: SessionCredential, permissions: PermissionSnapshot) -> Self {
        Self {
            user_id,
            credential,
            permissions,
        }
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired (separate from InvalidToken for specific handling).
    #[error("Token expired")]
    TokenExpired,

    /// User is authenticated but lacks access to the requested scope.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// The authentication service is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Returns true if this error indicates the user should re-authenticate.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AuthError::InvalidToken | AuthError::TokenExpired)
    }
}
