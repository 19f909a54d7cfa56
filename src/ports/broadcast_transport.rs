//! BroadcastTransport port - cross-instance delivery of change messages.
//!
//! Each server instance keeps its own in-memory subscriber registry, so a
//! change must reach every instance's activity bus. The change source
//! publishes to the transport; every instance subscribes and feeds what it
//! receives into its local bus.
//!
//! ```text
//! CDC source ──publish──▶ transport ──subscribe──▶ instance A bus
//!                                   └─subscribe──▶ instance B bus
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::activity::RawChangeMessage;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Broadcast transport unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode change message: {0}")]
    Encode(String),
}

#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Publishes one change message to every subscribed instance.
    async fn publish(&self, message: &RawChangeMessage) -> Result<(), TransportError>;

    /// Opens a stream of every message published from now on.
    ///
    /// Payloads that cannot be decoded are logged and skipped by the adapter.
    async fn subscribe(&self) -> Result<BoxStream<'static, RawChangeMessage>, TransportError>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
