//! TokenSigner port - binds cache tokens to a subscriber session.
//!
//! A cache token travelling in a notification is re-signed for every
//! receiving subscriber, so a leaked token cannot be replayed from another
//! session.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SessionCredential};

#[async_trait]
pub trait TokenSigner: Send + Sync {
    /// Returns `token` bound to `credential`.
    async fn sign(&self, token: &str, credential: &SessionCredential) -> Result<String, DomainError>;
}
