//! Client-facing notification built from an activity event.

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::catalog::ActivityAction;
use super::event::ActivityEvent;

/// What a live subscriber receives for one activity.
///
/// The cache token, when present, has already been bound to the receiving
/// subscriber's session; a notification is never shared between subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub action: ActivityAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    pub entity_id: String,
    pub scope_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub changed_keys: Vec<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_token: Option<String>,
}

impl ActivityNotification {
    /// Builds the notification without a cache token.
    pub fn from_event(event: &ActivityEvent) -> Self {
        Self {
            id: event.id.to_string(),
            event_type: event.event_type.to_string(),
            action: event.action,
            entity_type: event.subject.entity_type().map(str::to_string),
            resource_type: event.subject.resource_type().map(str::to_string),
            entity_id: event.entity_id.to_string(),
            scope_id: event.scope_id.as_ref().map(|s| s.to_string()),
            user_id: event.user_id.as_ref().map(|u| u.to_string()),
            changed_keys: event.changed_keys.clone(),
            created_at: event.created_at.to_rfc3339(),
            entity: event.entity.clone(),
            cache_token: None,
        }
    }

    pub fn with_cache_token(mut self, token: String) -> Self {
        self.cache_token = Some(token);
        self
    }
}
