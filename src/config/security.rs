//! Security configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Secrets for access token validation and cache token signing.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// HS256 key shared with the issuer of access tokens
    pub jwt_secret: SecretString,

    /// Expected `iss` claim, if any
    #[serde(default)]
    pub jwt_issuer: Option<String>,

    /// Expected `aud` claim, if any
    #[serde(default)]
    pub jwt_audience: Option<String>,

    /// HMAC key binding cache tokens to subscriber sessions
    pub token_signing_secret: SecretString,
}

impl SecurityConfig {
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        check_secret(&self.jwt_secret, "SECURITY__JWT_SECRET", environment)?;
        check_secret(
            &self.token_signing_secret,
            "SECURITY__TOKEN_SIGNING_SECRET",
            environment,
        )?;
        Ok(())
    }
}

fn check_secret(
    secret: &SecretString,
    name: &'static str,
    environment: &Environment,
) -> Result<(), ValidationError> {
    let len = secret.expose_secret().len();
    if len == 0 {
        return Err(ValidationError::MissingRequired(name));
    }
    if *environment == Environment::Production && len < MIN_PRODUCTION_SECRET_LEN {
        return Err(ValidationError::WeakSecret(name));
    }
    Ok(())
}
