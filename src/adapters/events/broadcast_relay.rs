//! BroadcastRelay - background service feeding the local activity bus.
//!
//! Subscribes to the broadcast transport and emits every received change
//! message into this instance's [`ActivityBus`]. Handler failures are logged
//! here, at the caller boundary, and never stop the relay.
//!
//! ## Graceful Shutdown
//!
//! The relay listens for a shutdown signal and returns after the message in
//! flight has been emitted.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;

use super::activity_bus::{ActivityBus, EmitOutcome};
use crate::domain::activity::RawChangeMessage;
use crate::ports::{BroadcastTransport, TransportError};

pub struct BroadcastRelay {
    transport: Arc<dyn BroadcastTransport>,
    bus: Arc<ActivityBus>,
}

impl BroadcastRelay {
    pub fn new(transport: Arc<dyn BroadcastTransport>, bus: Arc<ActivityBus>) -> Self {
        Self { transport, bus }
    }

    /// Runs until shutdown is signalled or the transport stream ends.
    ///
    /// Returns an error only if the subscription could not be opened.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        let mut messages = self.transport.subscribe().await?;
        tracing::info!(transport = self.transport.name(), "Broadcast relay started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Broadcast relay shutting down");
                        return Ok(());
                    }
                }

                next = messages.next() => {
                    let Some(message) = next else {
                        tracing::warn!(
                            transport = self.transport.name(),
                            "Broadcast stream ended"
                        );
                        return Ok(());
                    };
                    self.relay(message).await;
                }
            }
        }
    }

    async fn relay(&self, message: RawChangeMessage) {
        let id = message.id.clone();
        match self.bus.emit(message).await {
            Ok(EmitOutcome::Delivered { .. }) | Ok(EmitOutcome::Dropped(_)) => {}
            Err(e) => {
                tracing::error!(activity_id = %id, error = %e, "Activity handlers failed");
            }
        }
    }
}
