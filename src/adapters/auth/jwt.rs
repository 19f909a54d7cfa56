//! HS256 JWT session validator.
//!
//! Access tokens are issued by the main application and carry everything the
//! relay needs to filter live traffic, so no lookup happens per connection:
//!
//! ```json
//! {
//!   "sub": "user-123",
//!   "sid": "session-abc",
//!   "role": "user",
//!   "memberships": {"org1": "admin", "org2": "member"},
//!   "exp": 1700000000
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    AuthError, AuthenticatedSession, MembershipRole, PermissionSnapshot, ScopeId,
    SessionCredential, SystemRole, UserId,
};
use crate::ports::SessionValidator;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    /// Session id; cache tokens are bound to it.
    sid: String,
    exp: i64,
    #[serde(default)]
    role: SystemRole,
    #[serde(default)]
    memberships: HashMap<String, MembershipRole>,
}

pub struct JwtSessionValidator {
    secret: SecretString,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtSessionValidator {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedSession, AuthError> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());

        let claims = decode::<SessionClaims>(token, &key, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                _ => {
                    tracing::warn!(error = %e, "Token validation failed");
                    AuthError::InvalidToken
                }
            })?
            .claims;

        let user_id = UserId::new(&claims.sub).map_err(|_| {
            tracing::warn!("Invalid user ID in token");
            AuthError::InvalidToken
        })?;
        if claims.sid.is_empty() {
            tracing::warn!(user_id = %user_id, "Token missing session id");
            return Err(AuthError::InvalidToken);
        }

        let mut permissions = PermissionSnapshot::for_user(user_id.clone()).with_role(claims.role);
        for (scope, role) in claims.memberships {
            match ScopeId::new(scope) {
                Ok(scope_id) => permissions = permissions.with_membership(scope_id, role),
                Err(_) => tracing::debug!(user_id = %user_id, "Ignoring empty membership scope"),
            }
        }

        Ok(AuthenticatedSession::new(
            user_id,
            SessionCredential::new(claims.sid),
            permissions,
        ))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "jwt-test-secret";

    fn validator() -> JwtSessionValidator {
        JwtSessionValidator::new(SecretString::new(SECRET.to_string()))
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn valid_token_yields_session_with_memberships() {
        let jwt = token(
            json!({
                "sub": "user-1",
                "sid": "sess-1",
                "exp": in_one_hour(),
                "memberships": {"org1": "admin", "org2": "member"},
            }),
            SECRET,
        );

        let session = validator().validate(&jwt).await.unwrap();

        assert_eq!(session.user_id.as_str(), "user-1");
        assert_eq!(session.credential.expose(), "sess-1");
        assert_eq!(
            session.permissions.membership_in(&ScopeId::new("org1").unwrap()),
            Some(MembershipRole::Admin)
        );
        assert!(!session.permissions.is_system_admin());
    }

    #[tokio::test]
    async fn admin_role_is_carried() {
        let jwt = token(
            json!({"sub": "root", "sid": "s", "exp": in_one_hour(), "role": "admin"}),
            SECRET,
        );

        let session = validator().validate(&jwt).await.unwrap();

        assert!(session.permissions.is_system_admin());
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let jwt = token(json!({"sub": "u", "sid": "s", "exp": in_one_hour()}), "other");

        assert!(matches!(
            validator().validate(&jwt).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let jwt = token(
            json!({"sub": "u", "sid": "s", "exp": chrono::Utc::now().timestamp() - 3600}),
            SECRET,
        );

        assert!(matches!(
            validator().validate(&jwt).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn issuer_is_checked_when_configured() {
        let jwt = token(
            json!({"sub": "u", "sid": "s", "exp": in_one_hour(), "iss": "someone-else"}),
            SECRET,
        );

        let result = validator().with_issuer("app").validate(&jwt).await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn missing_session_id_is_invalid() {
        let jwt = token(json!({"sub": "u", "sid": "", "exp": in_one_hour()}), SECRET);

        assert!(matches!(
            validator().validate(&jwt).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn garbage_is_invalid() {
        assert!(matches!(
            validator().validate("not.a.jwt").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
