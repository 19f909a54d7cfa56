//! Redis pub/sub broadcast transport for multi-instance deployments.
//!
//! Change messages are published as JSON on one channel
//! (`activity:changes` by default). Every instance opens its own pub/sub
//! connection and feeds what it receives into its local activity bus.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::activity::RawChangeMessage;
use crate::ports::{BroadcastTransport, TransportError};

pub const DEFAULT_CHANNEL: &str = "activity:changes";

#[derive(Clone)]
pub struct RedisBroadcastTransport {
    client: redis::Client,
    publisher: MultiplexedConnection,
    channel: String,
}

impl RedisBroadcastTransport {
    /// Connects the publishing side. Subscriptions open their own connection.
    pub async fn connect(url: &str, channel: impl Into<String>) -> Result<Self, TransportError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let publisher = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;

        Ok(Self {
            client,
            publisher,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl BroadcastTransport for RedisBroadcastTransport {
    async fn publish(&self, message: &RawChangeMessage) -> Result<(), TransportError> {
        let payload =
            serde_json::to_string(message).map_err(|e| TransportError::Encode(e.to_string()))?;

        let mut conn = self.publisher.clone();
        conn.publish::<_, _, ()>(&self.channel, payload)
            .await
            .map_err(unavailable)
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, RawChangeMessage>, TransportError> {
        let connection = self
            .client
            .get_async_connection()
            .await
            .map_err(unavailable)?;
        let mut pubsub = connection.into_pubsub();
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(unavailable)?;

        tracing::info!(channel = %self.channel, "Subscribed to broadcast channel");

        let messages = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping non-text broadcast payload");
                    return None;
                }
            };
            match serde_json::from_str::<RawChangeMessage>(&payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable broadcast payload");
                    metrics::counter!("activity_bus_messages_dropped_total").increment(1);
                    None
                }
            }
        });

        Ok(messages.boxed())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

fn unavailable(e: redis::RedisError) -> TransportError {
    TransportError::Unavailable(e.to_string())
}
