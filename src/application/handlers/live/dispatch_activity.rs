//! ActivityDispatcher - fans validated activities out to live subscribers.
//!
//! Registered on the activity bus as a wildcard handler. For each event:
//!
//! ```text
//! event.scope_id ──▶ channel org:{scope} ──▶ dispatch guard
//!                                                  │
//!                         for each subscriber ◀────┘
//!                           can_receive? ── no ──▶ skip
//!                               │ yes
//!                           sign cache token with the subscriber's credential
//!                               │
//!                           write to sink ── ok ──▶ cursor = event.id
//! ```
//!
//! A signing or write failure for one subscriber is logged and never stops
//! delivery to the others. Nothing is retried; clients recover through
//! catch-up. Sinks never wait on a slow client, and a subscriber whose write
//! fails is evicted so its connection closes and the client reconnects.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::domain::activity::{ActivityEvent, ActivityNotification, ChannelKey};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{ActivityHandler, PermissionChecker, TokenSigner};

use super::registry::{Subscriber, SubscriberRegistry};

/// Per-event delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Subset of `failed` removed from the registry after a failed write.
    pub evicted: usize,
}

impl DispatchReport {
    fn record(&self) {
        metrics::counter!("activity_dispatch_delivered_total").increment(self.delivered as u64);
        metrics::counter!("activity_dispatch_skipped_total").increment(self.skipped as u64);
        metrics::counter!("activity_dispatch_failed_total").increment(self.failed as u64);
        metrics::counter!("activity_dispatch_evicted_total").increment(self.evicted as u64);
    }
}

pub struct ActivityDispatcher {
    registry: Arc<SubscriberRegistry>,
    permissions: Arc<dyn PermissionChecker>,
    signer: Arc<dyn TokenSigner>,
}

impl ActivityDispatcher {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        permissions: Arc<dyn PermissionChecker>,
        signer: Arc<dyn TokenSigner>,
    ) -> Self {
        Self {
            registry,
            permissions,
            signer,
        }
    }

    /// Create as an Arc (for registering on the bus).
    pub fn new_shared(
        registry: Arc<SubscriberRegistry>,
        permissions: Arc<dyn PermissionChecker>,
        signer: Arc<dyn TokenSigner>,
    ) -> Arc<Self> {
        Arc::new(Self::new(registry, permissions, signer))
    }

    /// Delivers one event to every permitted subscriber of its channel.
    pub async fn dispatch(&self, event: &ActivityEvent) -> DispatchReport {
        let Some(scope_id) = event.scope_id.as_ref() else {
            warn!(
                activity_id = %event.id,
                event_type = %event.event_type,
                "Dropping activity without scope"
            );
            return DispatchReport::default();
        };

        let channel = ChannelKey::for_scope(scope_id);

        // Held for the whole fan-out: one writer per channel at a time
        let Some(_guard) = self.registry.dispatch_guard(&channel).await else {
            trace!(channel = %channel, "No subscribers on channel");
            return DispatchReport::default();
        };

        let subscribers = self.registry.get_by_channel(&channel).await;
        let notification = ActivityNotification::from_event(event);
        let mut report = DispatchReport::default();
        let mut evicted = Vec::new();

        for subscriber in &subscribers {
            if !self.permissions.can_receive(subscriber.permissions(), event) {
                report.skipped += 1;
                continue;
            }

            match self.deliver(subscriber, event, notification.clone()).await {
                Ok(()) => {
                    subscriber.set_cursor(&event.id);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        subscriber_id = %subscriber.id(),
                        activity_id = %event.id,
                        error = %e,
                        "Failed to deliver activity"
                    );
                    report.failed += 1;
                    if e.code == ErrorCode::DeliveryFailed {
                        evicted.push(subscriber.id());
                    }
                }
            }
        }

        // Still under the guard, so the next event on this channel never sees them
        for subscriber_id in evicted {
            if self.registry.unregister(subscriber_id).await {
                debug!(subscriber_id = %subscriber_id, channel = %channel, "Evicted subscriber");
                report.evicted += 1;
            }
        }

        report.record();
        trace!(
            channel = %channel,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            evicted = report.evicted,
            "Activity dispatched"
        );
        report
    }

    async fn deliver(
        &self,
        subscriber: &Subscriber,
        event: &ActivityEvent,
        notification: ActivityNotification,
    ) -> Result<(), DomainError> {
        let notification = match event.cache_token.as_deref() {
            Some(token) => {
                let signed = self.signer.sign(token, subscriber.credential()).await?;
                notification.with_cache_token(signed)
            }
            None => notification,
        };

        subscriber
            .sink()
            .send(notification)
            .await
            .map_err(|e| DomainError::new(ErrorCode::DeliveryFailed, e.to_string()))
    }
}

#[async_trait]
impl ActivityHandler for ActivityDispatcher {
    async fn handle(&self, event: Arc<ActivityEvent>) -> Result<(), DomainError> {
        self.dispatch(&event).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ActivityDispatcher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{EventCatalog, RawChangeMessage, TrackedKind};
    use crate::domain::foundation::{
        ActivityId, PermissionSnapshot, ScopeId, SessionCredential, UserId,
    };
    use crate::ports::{SinkError, SubscriberSink};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<ActivityNotification>>,
    }

    impl RecordingSink {
        fn ids(&self) -> Vec<String> {
            self.received.lock().unwrap().iter().map(|n| n.id.clone()).collect()
        }
    }

    #[async_trait]
    impl SubscriberSink for RecordingSink {
        async fn send(&self, notification: ActivityNotification) -> Result<(), SinkError> {
            self.received.lock().unwrap().push(notification);
            Ok(())
        }
    }

    struct ClosedSink;

    #[async_trait]
    impl SubscriberSink for ClosedSink {
        async fn send(&self, _: ActivityNotification) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    /// Permits only the listed users.
    struct AllowUsers(HashSet<String>);

    impl PermissionChecker for AllowUsers {
        fn can_receive(&self, subscriber: &PermissionSnapshot, _: &ActivityEvent) -> bool {
            subscriber
                .user_id
                .as_ref()
                .map(|u| self.0.contains(u.as_str()))
                .unwrap_or(false)
        }
    }

    struct AllowAll;

    impl PermissionChecker for AllowAll {
        fn can_receive(&self, _: &PermissionSnapshot, _: &ActivityEvent) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct PrefixSigner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenSigner for PrefixSigner {
        async fn sign(&self, token: &str, credential: &SessionCredential) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}@{}", token, credential.expose()))
        }
    }

    /// Fails for one credential only.
    struct RejectingSigner(&'static str);

    #[async_trait]
    impl TokenSigner for RejectingSigner {
        async fn sign(&self, token: &str, credential: &SessionCredential) -> Result<String, DomainError> {
            if credential.expose() == self.0 {
                return Err(DomainError::new(ErrorCode::SigningFailed, "Simulated signing failure"));
            }
            Ok(token.to_string())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn catalog() -> EventCatalog {
        EventCatalog::new([
            ("page", TrackedKind::ProductEntity),
            ("membership", TrackedKind::Membership),
        ])
        .unwrap()
    }

    fn event(value: serde_json::Value) -> ActivityEvent {
        let raw: RawChangeMessage = serde_json::from_value(value).unwrap();
        raw.validate(&catalog()).unwrap()
    }

    fn page_event(id: &str, scope: &str) -> ActivityEvent {
        event(json!({
            "id": id,
            "type": "page.updated",
            "entityId": "p1",
            "scopeId": scope,
        }))
    }

    fn subscriber(user: &str, sink: Arc<dyn SubscriberSink>) -> Subscriber {
        Subscriber::new(
            PermissionSnapshot::for_user(UserId::new(user).unwrap()),
            SessionCredential::new(format!("sess-{}", user)),
            sink,
        )
    }

    fn channel(scope: &str) -> ChannelKey {
        ChannelKey::for_scope(&ScopeId::new(scope).unwrap())
    }

    fn dispatcher(
        registry: Arc<SubscriberRegistry>,
        permissions: impl PermissionChecker + 'static,
    ) -> ActivityDispatcher {
        ActivityDispatcher::new(registry, Arc::new(permissions), Arc::new(PrefixSigner::default()))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn permitted_subscriber_receives_and_unpermitted_is_untouched() {
        let registry = Arc::new(SubscriberRegistry::new());
        let s1_sink = Arc::new(RecordingSink::default());
        let s2_sink = Arc::new(RecordingSink::default());
        let s1 = subscriber("s1", s1_sink.clone());
        let s2 = subscriber("s2", s2_sink.clone());
        registry.register(s1.clone(), channel("org1")).await;
        registry.register(s2.clone(), channel("org1")).await;

        let dispatcher = dispatcher(registry, AllowUsers(HashSet::from(["s1".to_string()])));
        let report = dispatcher
            .dispatch(&event(json!({
                "id": "evt-id",
                "type": "membership.created",
                "scopeId": "org1",
                "entityId": "m1",
            })))
            .await;

        assert_eq!(
            report,
            DispatchReport { delivered: 1, skipped: 1, failed: 0, evicted: 0 }
        );
        assert_eq!(s1_sink.ids(), vec!["evt-id"]);
        assert_eq!(s1.cursor(), Some(ActivityId::new("evt-id").unwrap()));
        assert!(s2_sink.ids().is_empty());
        assert!(s2.cursor().is_none());
    }

    #[tokio::test]
    async fn event_without_scope_is_dropped() {
        let registry = Arc::new(SubscriberRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        registry.register(subscriber("u1", sink.clone()), channel("org1")).await;

        let report = dispatcher(registry, AllowAll)
            .dispatch(&event(json!({"id": "1", "type": "page.created", "entityId": "p1"})))
            .await;

        assert_eq!(report, DispatchReport::default());
        assert!(sink.ids().is_empty());
    }

    #[tokio::test]
    async fn only_subscribers_of_the_event_scope_receive_it() {
        let registry = Arc::new(SubscriberRegistry::new());
        let org1_sink = Arc::new(RecordingSink::default());
        let org2_sink = Arc::new(RecordingSink::default());
        registry.register(subscriber("a", org1_sink.clone()), channel("org1")).await;
        registry.register(subscriber("b", org2_sink.clone()), channel("org2")).await;

        dispatcher(registry, AllowAll).dispatch(&page_event("1", "org2")).await;

        assert!(org1_sink.ids().is_empty());
        assert_eq!(org2_sink.ids(), vec!["1"]);
    }

    #[tokio::test]
    async fn empty_channel_reports_nothing() {
        let registry = Arc::new(SubscriberRegistry::new());
        let report = dispatcher(registry, AllowAll).dispatch(&page_event("1", "org1")).await;
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn failed_write_does_not_block_siblings() {
        let registry = Arc::new(SubscriberRegistry::new());
        let closed = subscriber("a", Arc::new(ClosedSink));
        let healthy_sink = Arc::new(RecordingSink::default());
        let healthy = subscriber("b", healthy_sink.clone());
        registry.register(closed.clone(), channel("org1")).await;
        registry.register(healthy.clone(), channel("org1")).await;

        let report = dispatcher(registry.clone(), AllowAll)
            .dispatch(&page_event("7", "org1"))
            .await;

        assert_eq!(
            report,
            DispatchReport { delivered: 1, skipped: 0, failed: 1, evicted: 1 }
        );
        assert!(closed.cursor().is_none());
        let remaining: Vec<_> = registry
            .get_by_channel(&channel("org1"))
            .await
            .iter()
            .map(Subscriber::id)
            .collect();
        assert_eq!(remaining, vec![healthy.id()]);
        assert_eq!(healthy.cursor(), Some(ActivityId::new("7").unwrap()));
        assert_eq!(healthy_sink.ids(), vec!["7"]);
    }

    #[tokio::test]
    async fn signing_failure_isolated_to_one_subscriber() {
        let registry = Arc::new(SubscriberRegistry::new());
        let rejected_sink = Arc::new(RecordingSink::default());
        let accepted_sink = Arc::new(RecordingSink::default());
        registry.register(subscriber("a", rejected_sink.clone()), channel("org1")).await;
        registry.register(subscriber("b", accepted_sink.clone()), channel("org1")).await;

        let dispatcher = ActivityDispatcher::new(
            registry,
            Arc::new(AllowAll),
            Arc::new(RejectingSigner("sess-a")),
        );
        let report = dispatcher
            .dispatch(&event(json!({
                "id": "1",
                "type": "page.updated",
                "entityId": "p1",
                "scopeId": "org1",
                "cacheToken": "tok",
            })))
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted, 0);
        assert!(rejected_sink.ids().is_empty());
        assert_eq!(accepted_sink.ids(), vec!["1"]);
    }

    #[tokio::test]
    async fn cache_token_is_bound_to_each_subscriber_session() {
        let registry = Arc::new(SubscriberRegistry::new());
        let a_sink = Arc::new(RecordingSink::default());
        let b_sink = Arc::new(RecordingSink::default());
        registry.register(subscriber("a", a_sink.clone()), channel("org1")).await;
        registry.register(subscriber("b", b_sink.clone()), channel("org1")).await;

        dispatcher(registry, AllowAll)
            .dispatch(&event(json!({
                "id": "1",
                "type": "page.updated",
                "entityId": "p1",
                "scopeId": "org1",
                "cacheToken": "tok",
            })))
            .await;

        let a_token = a_sink.received.lock().unwrap()[0].cache_token.clone();
        let b_token = b_sink.received.lock().unwrap()[0].cache_token.clone();
        assert_eq!(a_token.as_deref(), Some("tok@sess-a"));
        assert_eq!(b_token.as_deref(), Some("tok@sess-b"));
    }

    #[tokio::test]
    async fn no_signing_without_cache_token() {
        let registry = Arc::new(SubscriberRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        registry.register(subscriber("a", sink.clone()), channel("org1")).await;
        let signer = Arc::new(PrefixSigner::default());

        ActivityDispatcher::new(registry, Arc::new(AllowAll), signer.clone())
            .dispatch(&page_event("1", "org1"))
            .await;

        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
        assert!(sink.received.lock().unwrap()[0].cache_token.is_none());
    }

    #[tokio::test]
    async fn sequential_events_arrive_in_order_and_advance_cursor() {
        let registry = Arc::new(SubscriberRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let sub = subscriber("a", sink.clone());
        registry.register(sub.clone(), channel("org1")).await;
        let dispatcher = dispatcher(registry, AllowAll);

        dispatcher.dispatch(&page_event("10", "org1")).await;
        dispatcher.dispatch(&page_event("11", "org1")).await;

        assert_eq!(sink.ids(), vec!["10", "11"]);
        assert_eq!(sub.cursor(), Some(ActivityId::new("11").unwrap()));
    }

    #[tokio::test]
    async fn cursor_tracks_last_written_id_not_string_order() {
        let registry = Arc::new(SubscriberRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let sub = subscriber("a", sink.clone());
        registry.register(sub.clone(), channel("org1")).await;
        let dispatcher = dispatcher(registry, AllowAll);

        dispatcher.dispatch(&page_event("9", "org1")).await;
        dispatcher.dispatch(&page_event("10", "org1")).await;

        assert_eq!(sink.ids(), vec!["9", "10"]);
        assert_eq!(sub.cursor(), Some(ActivityId::new("10").unwrap()));
    }

    #[tokio::test]
    async fn full_queue_evicts_without_delaying_other_channels() {
        use crate::adapters::websocket::ChannelSink;

        let registry = Arc::new(SubscriberRegistry::new());
        let (stalled_sink, _never_drained) = ChannelSink::new(1);
        registry
            .register(subscriber("stalled", Arc::new(stalled_sink)), channel("orgA"))
            .await;
        let org_b_sink = Arc::new(RecordingSink::default());
        registry
            .register(subscriber("b", org_b_sink.clone()), channel("orgB"))
            .await;
        let dispatcher = dispatcher(registry.clone(), AllowAll);

        let started = std::time::Instant::now();
        for id in ["1", "2", "3", "4", "5", "6"] {
            dispatcher.dispatch(&page_event(id, "orgA")).await;
        }
        let report = dispatcher.dispatch(&page_event("7", "orgB")).await;

        assert!(started.elapsed() < std::time::Duration::from_millis(500));
        assert_eq!(report.delivered, 1);
        assert_eq!(org_b_sink.ids(), vec!["7"]);
        assert!(registry.get_by_channel(&channel("orgA")).await.is_empty());
        assert_eq!(registry.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn handle_never_fails() {
        let registry = Arc::new(SubscriberRegistry::new());
        registry.register(subscriber("a", Arc::new(ClosedSink)), channel("org1")).await;

        let result = dispatcher(registry, AllowAll)
            .handle(Arc::new(page_event("1", "org1")))
            .await;

        assert!(result.is_ok());
    }
}
