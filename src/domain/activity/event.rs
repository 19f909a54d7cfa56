//! Raw change messages and the validated activity events built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::domain::foundation::{
    ActivityId, EntityId, ScopeId, Timestamp, UserId, ValidationError,
};

use super::catalog::{ActivityAction, EventCatalog, EventType};

/// W3C trace context carried alongside a change message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub traceparent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracestate: Option<String>,
}

/// Change message as produced by the change-data-capture source.
///
/// Nothing here is trusted; [`RawChangeMessage::validate`] turns it into an
/// [`ActivityEvent`] or explains why it must be dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChangeMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default, alias = "organizationId")]
    pub scope_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub changed_keys: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<TraceContext>,
}

/// Why a raw message was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("Unknown event type '{0}'")]
    UnknownType(String),

    #[error("Action '{action}' does not match event type '{event_type}'")]
    ActionMismatch { event_type: String, action: String },

    #[error("Subject '{subject}' does not match event type '{event_type}'")]
    SubjectMismatch { event_type: String, subject: String },

    #[error(transparent)]
    InvalidField(#[from] ValidationError),
}

/// Whether the subject of an activity is an entity or a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Entity(String),
    Resource(String),
}

impl Subject {
    pub fn type_name(&self) -> &str {
        match self {
            Subject::Entity(name) | Subject::Resource(name) => name,
        }
    }

    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Subject::Entity(name) => Some(name),
            Subject::Resource(_) => None,
        }
    }

    pub fn resource_type(&self) -> Option<&str> {
        match self {
            Subject::Resource(name) => Some(name),
            Subject::Entity(_) => None,
        }
    }
}

/// A validated, immutable entry of the activity log.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub id: ActivityId,
    pub event_type: EventType,
    pub action: ActivityAction,
    pub subject: Subject,
    pub scope_id: Option<ScopeId>,
    pub entity_id: EntityId,
    pub user_id: Option<UserId>,
    pub changed_keys: Vec<String>,
    pub created_at: Timestamp,
    pub entity: Option<JsonValue>,
    pub cache_token: Option<String>,
    pub trace_context: Option<TraceContext>,
}

impl RawChangeMessage {
    /// Checks the message against the catalog and builds a typed event.
    ///
    /// A missing action or subject is derived from the event type; a present
    /// one must agree with it. A missing scope is allowed here and left for the
    /// router to reject.
    pub fn validate(self, catalog: &EventCatalog) -> Result<ActivityEvent, MalformedMessage> {
        let event_type = catalog
            .parse(&self.event_type)
            .ok_or_else(|| MalformedMessage::UnknownType(self.event_type.clone()))?;

        let expected_action = event_type.verb().action();
        let action = match self.action.as_deref() {
            None => expected_action,
            Some(raw) => match raw.parse::<ActivityAction>() {
                Ok(action) if action == expected_action => action,
                _ => {
                    return Err(MalformedMessage::ActionMismatch {
                        event_type: self.event_type,
                        action: raw.to_string(),
                    })
                }
            },
        };

        let subject = self.resolve_subject(catalog, &event_type)?;

        let id = ActivityId::new(self.id)?;
        let entity_id = EntityId::new(self.entity_id.unwrap_or_default())?;
        let scope_id = non_empty(self.scope_id).map(ScopeId::new).transpose()?;
        let user_id = non_empty(self.user_id).map(UserId::new).transpose()?;

        Ok(ActivityEvent {
            id,
            event_type,
            action,
            subject,
            scope_id,
            entity_id,
            user_id,
            changed_keys: self.changed_keys,
            created_at: self
                .created_at
                .map(Timestamp::from_datetime)
                .unwrap_or_else(Timestamp::now),
            entity: self.entity,
            cache_token: non_empty(self.cache_token),
            trace_context: self.trace_context,
        })
    }

    fn resolve_subject(
        &self,
        catalog: &EventCatalog,
        event_type: &EventType,
    ) -> Result<Subject, MalformedMessage> {
        let tracked = event_type.tracked_type();
        let is_entity = catalog
            .kind_of(tracked)
            .map(|kind| kind.is_entity())
            .unwrap_or(false);

        let declared = match (self.entity_type.as_deref(), self.resource_type.as_deref()) {
            (Some(entity), None) => Some((entity, true)),
            (None, Some(resource)) => Some((resource, false)),
            (None, None) => None,
            (Some(entity), Some(_)) => {
                return Err(MalformedMessage::SubjectMismatch {
                    event_type: self.event_type.clone(),
                    subject: entity.to_string(),
                })
            }
        };

        match declared {
            Some((name, declared_entity)) if name != tracked || declared_entity != is_entity => {
                Err(MalformedMessage::SubjectMismatch {
                    event_type: self.event_type.clone(),
                    subject: name.to_string(),
                })
            }
            _ if is_entity => Ok(Subject::Entity(tracked.to_string())),
            _ => Ok(Subject::Resource(tracked.to_string())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
