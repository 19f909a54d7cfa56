//! PermissionChecker port - may this subscriber see this event?
//!
//! The permission engine lives outside the distribution core. The dispatcher
//! only asks a yes/no question per subscriber and event; a `false` answer
//! means the subscriber is skipped with no side effects at all.

use crate::domain::activity::ActivityEvent;
use crate::domain::foundation::PermissionSnapshot;

/// Per-subscriber, per-event visibility predicate.
///
/// Must be cheap and synchronous: it runs inside the fan-out loop for every
/// subscriber of a channel.
pub trait PermissionChecker: Send + Sync {
    fn can_receive(&self, subscriber: &PermissionSnapshot, event: &ActivityEvent) -> bool;
}
