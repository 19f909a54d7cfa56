//! Mock session validator for testing.
//!
//! Avoids minting real JWTs in handler and integration tests.
//!
//! # Example
//!
//! ```ignore
//! let validator = MockSessionValidator::new()
//!     .with_member("valid-token", "user-123", "org1");
//!
//! let session = validator.validate("valid-token").await?;
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{
    AuthError, AuthenticatedSession, MembershipRole, PermissionSnapshot, ScopeId,
    SessionCredential, UserId,
};
use crate::ports::SessionValidator;

/// Stores a map of tokens to sessions. Unknown tokens return `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockSessionValidator {
    sessions: RwLock<HashMap<String, AuthenticatedSession>>,
    /// Optional error to return for all validations (for error testing)
    force_error: RwLock<Option<AuthError>>,
}

impl MockSessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to a session.
    pub fn with_session(self, token: impl Into<String>, session: AuthenticatedSession) -> Self {
        self.add_session(token, session);
        self
    }

    /// Adds a token for a plain member of one scope.
    ///
    /// The session credential is `sess-{user_id}`.
    ///
    /// # Panics
    ///
    /// Panics on empty ids; intended for test setup only.
    pub fn with_member(
        self,
        token: impl Into<String>,
        user_id: &str,
        scope_id: &str,
    ) -> Self {
        let user_id = UserId::new(user_id).expect("test user id must not be empty");
        let scope_id = ScopeId::new(scope_id).expect("test scope id must not be empty");
        let session = AuthenticatedSession::new(
            user_id.clone(),
            SessionCredential::new(format!("sess-{}", user_id)),
            PermissionSnapshot::for_user(user_id).with_membership(scope_id, MembershipRole::Member),
        );
        self.with_session(token, session)
    }

    /// Forces all validations to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self
            .force_error
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(error);
        self
    }

    /// Registers a new valid token at runtime.
    pub fn add_session(&self, token: impl Into<String>, session: AuthenticatedSession) {
        self.sessions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(token.into(), session);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        self.sessions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(token);
    }
}

#[async_trait]
impl SessionValidator for MockSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedSession, AuthError> {
        if let Some(error) = self
            .force_error
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        self.sessions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
