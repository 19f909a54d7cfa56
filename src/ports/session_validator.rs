//! Session validation port for access token validation.
//!
//! Resolves a bearer token into the session that owns it: who the user is,
//! which credential their cache tokens are bound to, and the permission
//! snapshot used for live filtering. Provider-agnostic; the JWT adapter and
//! the mock adapter both implement it.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedSession};

/// Validates access tokens and extracts the session behind them.
///
/// # Contract
///
/// - `AuthError::InvalidToken` for malformed or badly signed tokens
/// - `AuthError::TokenExpired` for expired tokens
/// - `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<AuthenticatedSession, AuthError>;
}
