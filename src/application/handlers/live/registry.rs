//! Subscriber registry - live subscribers grouped by channel.
//!
//! One channel per tenant scope (`org:{scopeId}`), carrying every kind of
//! activity for that scope.
//!
//! ```text
//! Channel: org:org1       Channel: org:org2
//! ├── subscriber-a        ├── subscriber-d
//! ├── subscriber-b        └── subscriber-e
//! └── subscriber-c
//! ```
//!
//! Each channel also has a dispatch guard. Whoever fans an event out to a
//! channel holds that guard for the whole fan-out, so events for one channel
//! are delivered strictly one after another and each subscriber cursor has a
//! single writer. A guard stays the channel's guard for as long as anyone
//! holds it, even if the channel empties and is recreated meanwhile.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

use crate::domain::activity::ChannelKey;
use crate::domain::foundation::{ActivityId, PermissionSnapshot, SessionCredential, SubscriberId};
use crate::ports::SubscriberSink;

/// One connected live client.
///
/// Cloning is cheap and every clone shares the same cursor and sink.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    permissions: PermissionSnapshot,
    credential: SessionCredential,
    sink: Arc<dyn SubscriberSink>,
    cursor: Arc<Mutex<Option<ActivityId>>>,
}

impl Subscriber {
    pub fn new(
        permissions: PermissionSnapshot,
        credential: SessionCredential,
        sink: Arc<dyn SubscriberSink>,
    ) -> Self {
        Self {
            id: SubscriberId::new(),
            permissions,
            credential,
            sink,
            cursor: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the cursor at a known position, e.g. after a catch-up.
    pub fn with_cursor(self, cursor: ActivityId) -> Self {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = Some(cursor);
        self
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn permissions(&self) -> &PermissionSnapshot {
        &self.permissions
    }

    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    pub fn sink(&self) -> &Arc<dyn SubscriberSink> {
        &self.sink
    }

    /// Id of the last activity delivered to this subscriber.
    pub fn cursor(&self) -> Option<ActivityId> {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records `id` as the last activity written to this subscriber.
    ///
    /// Only called under the channel's dispatch guard, which already orders
    /// writes, so ids are never compared here.
    pub(crate) fn set_cursor(&self, id: &ActivityId) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.clone());
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("permissions", &self.permissions)
            .field("cursor", &self.cursor())
            .finish_non_exhaustive()
    }
}

type DispatchGuard = Arc<AsyncMutex<()>>;

struct Channel {
    subscribers: Vec<Subscriber>,
    dispatch_guard: DispatchGuard,
}

/// Registry of live subscribers.
///
/// Uses `RwLock` since lookups on every dispatched event vastly outnumber
/// connects and disconnects.
pub struct SubscriberRegistry {
    channels: RwLock<HashMap<ChannelKey, Channel>>,

    /// subscriber_id → channel for O(1) lookup on disconnect.
    subscriber_channels: RwLock<HashMap<SubscriberId, ChannelKey>>,

    /// Guards of dropped channels that a fan-out may still hold.
    /// Only touched with the `channels` write lock held.
    orphaned_guards: Mutex<HashMap<ChannelKey, Weak<AsyncMutex<()>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            subscriber_channels: RwLock::new(HashMap::new()),
            orphaned_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Guard for a channel being (re)created: the orphaned one if it is
    /// still held, otherwise a fresh one.
    fn adopt_guard(&self, channel: &ChannelKey) -> DispatchGuard {
        self.orphaned_guards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel)
            .and_then(|weak| weak.upgrade())
            .unwrap_or_else(|| Arc::new(AsyncMutex::new(())))
    }

    /// Drops the subscriber from its channel and the channel if it empties.
    fn remove_from_channel(
        &self,
        channels: &mut HashMap<ChannelKey, Channel>,
        channel: &ChannelKey,
        subscriber_id: SubscriberId,
    ) {
        let Some(entry) = channels.get_mut(channel) else {
            return;
        };
        entry.subscribers.retain(|s| s.id() != subscriber_id);
        if !entry.subscribers.is_empty() {
            return;
        }

        if let Some(removed) = channels.remove(channel) {
            let mut orphaned = self
                .orphaned_guards
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            orphaned.retain(|_, weak| weak.strong_count() > 0);
            // Someone besides this entry holds it: a fan-out is in flight
            if Arc::strong_count(&removed.dispatch_guard) > 1 {
                orphaned.insert(channel.clone(), Arc::downgrade(&removed.dispatch_guard));
            }
        }
    }

    /// Adds a subscriber to a channel, creating the channel if needed.
    ///
    /// A subscriber id already registered elsewhere is moved.
    pub async fn register(&self, subscriber: Subscriber, channel: ChannelKey) {
        let mut channels = self.channels.write().await;
        let mut subscriber_channels = self.subscriber_channels.write().await;

        if let Some(previous) = subscriber_channels.insert(subscriber.id(), channel.clone()) {
            self.remove_from_channel(&mut channels, &previous, subscriber.id());
        }

        if !channels.contains_key(&channel) {
            let dispatch_guard = self.adopt_guard(&channel);
            channels.insert(
                channel.clone(),
                Channel {
                    subscribers: Vec::new(),
                    dispatch_guard,
                },
            );
        }
        if let Some(entry) = channels.get_mut(&channel) {
            entry.subscribers.push(subscriber);
        }
    }

    /// Removes a subscriber from whichever channel holds it.
    ///
    /// Empty channels are dropped. Returns `false` for unknown ids.
    pub async fn unregister(&self, subscriber_id: SubscriberId) -> bool {
        let mut channels = self.channels.write().await;
        let mut subscriber_channels = self.subscriber_channels.write().await;

        match subscriber_channels.remove(&subscriber_id) {
            Some(channel) => {
                self.remove_from_channel(&mut channels, &channel, subscriber_id);
                true
            }
            None => false,
        }
    }

    /// Snapshot of a channel's subscribers, in registration order.
    pub async fn get_by_channel(&self, channel: &ChannelKey) -> Vec<Subscriber> {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|c| c.subscribers.clone())
            .unwrap_or_default()
    }

    /// Acquires the channel's dispatch guard, or `None` if nobody listens.
    pub async fn dispatch_guard(&self, channel: &ChannelKey) -> Option<OwnedMutexGuard<()>> {
        let guard = self
            .channels
            .read()
            .await
            .get(channel)
            .map(|c| Arc::clone(&c.dispatch_guard))?;
        Some(guard.lock_owned().await)
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscriber_channels.read().await.len()
    }

    /// All channels with at least one subscriber (for monitoring).
    pub async fn active_channels(&self) -> Vec<ChannelKey> {
        self.channels.read().await.keys().cloned().collect()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
