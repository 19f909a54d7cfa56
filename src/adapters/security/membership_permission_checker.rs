//! Membership-based visibility rules for live activities.
//!
//! - System admins receive everything.
//! - Everyone else must belong to the event's scope.
//! - Membership activities are further restricted to scope admins and to the
//!   member the activity is about.

use std::sync::Arc;

use crate::domain::activity::{ActivityEvent, EventCatalog, TrackedKind};
use crate::domain::foundation::{MembershipRole, PermissionSnapshot};
use crate::ports::PermissionChecker;

pub struct MembershipPermissionChecker {
    catalog: Arc<EventCatalog>,
}

impl MembershipPermissionChecker {
    pub fn new(catalog: Arc<EventCatalog>) -> Self {
        Self { catalog }
    }

    fn is_membership(&self, event: &ActivityEvent) -> bool {
        self.catalog.kind_of(event.event_type.tracked_type()) == Some(TrackedKind::Membership)
    }
}

impl PermissionChecker for MembershipPermissionChecker {
    fn can_receive(&self, subscriber: &PermissionSnapshot, event: &ActivityEvent) -> bool {
        if subscriber.is_system_admin() {
            return true;
        }

        let Some(scope_id) = event.scope_id.as_ref() else {
            return false;
        };
        let Some(role) = subscriber.membership_in(scope_id) else {
            return false;
        };

        if !self.is_membership(event) {
            return true;
        }

        // Membership changes: scope admins, or the member concerned
        role == MembershipRole::Admin
            || match (&subscriber.user_id, &event.user_id) {
                (Some(subscriber_user), Some(member)) => subscriber_user == member,
                _ => false,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::RawChangeMessage;
    use crate::domain::foundation::{ScopeId, SystemRole, UserId};
    use serde_json::json;

    fn catalog() -> Arc<EventCatalog> {
        Arc::new(
            EventCatalog::new([
                ("page", TrackedKind::ProductEntity),
                ("membership", TrackedKind::Membership),
            ])
            .unwrap(),
        )
    }

    fn event(event_type: &str, scope: &str, user: &str) -> ActivityEvent {
        let raw: RawChangeMessage = serde_json::from_value(json!({
            "id": "1",
            "type": event_type,
            "entityId": "e1",
            "scopeId": scope,
            "userId": user,
        }))
        .unwrap();
        raw.validate(&catalog()).unwrap()
    }

    fn member(user: &str, scope: &str, role: MembershipRole) -> PermissionSnapshot {
        PermissionSnapshot::for_user(UserId::new(user).unwrap())
            .with_membership(ScopeId::new(scope).unwrap(), role)
    }

    fn checker() -> MembershipPermissionChecker {
        MembershipPermissionChecker::new(catalog())
    }

    #[test]
    fn system_admin_receives_everything() {
        let admin = PermissionSnapshot::for_user(UserId::new("root").unwrap())
            .with_role(SystemRole::Admin);

        assert!(checker().can_receive(&admin, &event("page.updated", "org9", "u1")));
        assert!(checker().can_receive(&admin, &event("membership.created", "org9", "u1")));
    }

    #[test]
    fn member_receives_entity_activity_in_own_scope() {
        let subscriber = member("u1", "org1", MembershipRole::Member);

        assert!(checker().can_receive(&subscriber, &event("page.updated", "org1", "u2")));
        assert!(!checker().can_receive(&subscriber, &event("page.updated", "org2", "u2")));
    }

    #[test]
    fn membership_activity_visible_to_scope_admin() {
        let admin = member("u1", "org1", MembershipRole::Admin);

        assert!(checker().can_receive(&admin, &event("membership.created", "org1", "u2")));
    }

    #[test]
    fn membership_activity_visible_to_member_concerned() {
        let subscriber = member("u2", "org1", MembershipRole::Member);

        assert!(checker().can_receive(&subscriber, &event("membership.updated", "org1", "u2")));
    }

    #[test]
    fn membership_activity_hidden_from_other_members() {
        let subscriber = member("u3", "org1", MembershipRole::Member);

        assert!(!checker().can_receive(&subscriber, &event("membership.created", "org1", "u2")));
    }
}
