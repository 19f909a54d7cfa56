//! SubscriberSink port - the output stream of one live subscriber.
//!
//! The dispatcher writes notifications through this port and never sees the
//! underlying transport (WebSocket, server-sent events, test buffer).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::activity::ActivityNotification;

/// Errors writing to a subscriber stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The connection went away.
    #[error("Subscriber stream closed")]
    Closed,

    /// The subscriber's queue has no room; it is not keeping up.
    #[error("Subscriber queue full")]
    Full,

    /// Any other transport failure.
    #[error("Subscriber stream error: {0}")]
    Transport(String),
}

/// Output stream of one subscriber.
///
/// A successful `send` means the notification was accepted by the stream in
/// order; it does not mean the client has processed it. Implementations must
/// not wait on a slow client: a write either is accepted now or fails.
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    async fn send(&self, notification: ActivityNotification) -> Result<(), SinkError>;
}
