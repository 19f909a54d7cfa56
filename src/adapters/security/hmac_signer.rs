//! HMAC-SHA256 cache token signer.
//!
//! A signed token is `{token}.{hex(HMAC(secret, "{credential}:{token}"))}`.
//! Binding the credential into the MAC means a token delivered to one
//! session does not verify for another.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::{DomainError, ErrorCode, SessionCredential};
use crate::ports::TokenSigner;

type HmacSha256 = Hmac<Sha256>;

pub struct HmacTokenSigner {
    secret: SecretString,
}

impl HmacTokenSigner {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Checks a token produced by [`TokenSigner::sign`] for `credential`.
    pub fn verify(&self, signed: &str, credential: &SessionCredential) -> bool {
        let Some((token, signature)) = signed.rsplit_once('.') else {
            return false;
        };
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let Ok(expected) = self.mac(token, credential) else {
            return false;
        };

        expected.as_slice().ct_eq(provided.as_slice()).unwrap_u8() == 1
    }

    fn mac(&self, token: &str, credential: &SessionCredential) -> Result<Vec<u8>, DomainError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| DomainError::new(ErrorCode::SigningFailed, e.to_string()))?;
        mac.update(credential.expose().as_bytes());
        mac.update(b":");
        mac.update(token.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[async_trait]
impl TokenSigner for HmacTokenSigner {
    async fn sign(&self, token: &str, credential: &SessionCredential) -> Result<String, DomainError> {
        let signature = self.mac(token, credential)?;
        Ok(format!("{}.{}", token, hex::encode(signature)))
    }
}
