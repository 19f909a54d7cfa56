//! In-process broadcast transport for single-instance deployments and tests.
//!
//! Backed by a `tokio::sync::broadcast` channel. Every published message is
//! also recorded so tests can inspect what went over the wire.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::domain::activity::RawChangeMessage;
use crate::ports::{BroadcastTransport, TransportError};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct InMemoryBroadcastTransport {
    sender: broadcast::Sender<RawChangeMessage>,
    published: Arc<Mutex<Vec<RawChangeMessage>>>,
}

impl InMemoryBroadcastTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a transport whose subscribers may lag by at most `capacity`
    /// messages before older ones are skipped.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every message published so far, in publish order.
    pub fn published_messages(&self) -> Vec<RawChangeMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryBroadcastTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastTransport for InMemoryBroadcastTransport {
    async fn publish(&self, message: &RawChangeMessage) -> Result<(), TransportError> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        // No receivers is not an error; the message simply reaches nobody.
        let _ = self.sender.send(message.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, RawChangeMessage>, TransportError> {
        let receiver = self.sender.subscribe();
        let messages = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Broadcast subscriber lagged, messages skipped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(messages.boxed())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
