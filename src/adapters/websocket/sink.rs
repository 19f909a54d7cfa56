//! Bounded per-connection queue implementing `SubscriberSink`.
//!
//! The dispatcher writes into the queue; the socket task drains it. Writes
//! never wait: a full queue fails at once, so a stalled client cannot hold up
//! the dispatch of any channel.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::activity::ActivityNotification;
use crate::ports::{SinkError, SubscriberSink};

pub struct ChannelSink {
    sender: mpsc::Sender<ActivityNotification>,
}

impl ChannelSink {
    /// Creates the sink and the receiver the socket task reads from.
    ///
    /// The receiver yields `None` once every sink clone is gone, which is how
    /// the socket task learns its subscriber was evicted.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ActivityNotification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl SubscriberSink for ChannelSink {
    async fn send(&self, notification: ActivityNotification) -> Result<(), SinkError> {
        self.sender.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ActivityAction;
    use std::time::Duration;

    fn notification(id: &str) -> ActivityNotification {
        ActivityNotification {
            id: id.to_string(),
            event_type: "page.updated".to_string(),
            action: ActivityAction::Update,
            entity_type: Some("page".to_string()),
            resource_type: None,
            entity_id: "p1".to_string(),
            scope_id: Some("org1".to_string()),
            user_id: None,
            changed_keys: vec!["title".to_string()],
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            entity: None,
            cache_token: None,
        }
    }

    #[tokio::test]
    async fn queued_notification_reaches_receiver() {
        let (sink, mut rx) = ChannelSink::new(4);

        sink.send(notification("1")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().id, "1");
    }

    #[tokio::test]
    async fn full_queue_fails_without_waiting() {
        let (sink, _rx) = ChannelSink::new(1);
        sink.send(notification("1")).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(50), sink.send(notification("2")))
            .await
            .expect("write on a full queue must not wait");

        assert!(matches!(result, Err(SinkError::Full)));
    }

    #[tokio::test]
    async fn dropped_receiver_reports_closed() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);

        let result = sink.send(notification("1")).await;

        assert!(matches!(result, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn dropping_the_sink_ends_the_receiver() {
        let (sink, mut rx) = ChannelSink::new(2);
        sink.send(notification("1")).await.unwrap();
        drop(sink);

        assert_eq!(rx.recv().await.unwrap().id, "1");
        assert!(rx.recv().await.is_none());
    }
}
