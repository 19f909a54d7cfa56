//! Catch-up request and response types.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ActivityId, EntityId, ScopeId};

use super::counters::{ClientCounters, ContextCounter};

/// Upper bound on rows returned by one deletion scan.
pub const DELETION_SCAN_LIMIT: u32 = 1000;

/// What a reconnecting client sends.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchupRequest {
    pub scope_ids: Vec<ScopeId>,
    #[serde(default)]
    pub cursor: Option<ActivityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_counters: Option<HashMap<String, u64>>,
}

impl CatchupRequest {
    pub fn client_counters(&self) -> Option<ClientCounters> {
        self.client_counters.clone().map(ClientCounters::from_wire)
    }
}

/// Delta for one changed scope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeChanges {
    pub seq: u64,
    pub m_seq: u64,
    pub deleted_ids: Vec<EntityId>,
}

impl ScopeChanges {
    pub fn from_counter(counter: ContextCounter) -> Self {
        Self {
            seq: counter.seq,
            m_seq: counter.m_seq,
            deleted_ids: Vec::new(),
        }
    }
}

/// What the client gets back. Computed per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchupResponse {
    pub changes: BTreeMap<ScopeId, ScopeChanges>,
    pub cursor: Option<ActivityId>,
}

impl CatchupResponse {
    /// Response for a poll where nothing needs to be sent.
    pub fn unchanged(cursor: Option<ActivityId>) -> Self {
        Self {
            changes: BTreeMap::new(),
            cursor,
        }
    }
}

/// A deleted business entity found by the deletion scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedEntity {
    pub scope_id: ScopeId,
    pub entity_id: EntityId,
}

/// Parameters of one bounded deletion scan over the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionScan {
    /// Only rows strictly after this id.
    pub after: ActivityId,
    pub scope_ids: Vec<ScopeId>,
    pub entity_types: Vec<String>,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_deserializes_wire_form() {
        let request: CatchupRequest = serde_json::from_value(json!({
            "scopeIds": ["orgA", "orgB"],
            "cursor": null,
            "clientCounters": {"orgA": 5, "orgA:m": 2}
        }))
        .unwrap();

        assert_eq!(request.scope_ids.len(), 2);
        assert!(request.cursor.is_none());
        let counters = request.client_counters().unwrap();
        assert_eq!(
            counters.get(&ScopeId::new("orgA").unwrap()),
            ContextCounter::new(5, 2)
        );
    }

    #[test]
    fn request_without_counters_is_first_connect() {
        let request: CatchupRequest =
            serde_json::from_value(json!({"scopeIds": ["orgA"], "cursor": "evt-9"})).unwrap();
        assert!(request.client_counters().is_none());
        assert_eq!(request.cursor.unwrap().as_str(), "evt-9");
    }

    #[test]
    fn response_serializes_wire_form() {
        let mut response = CatchupResponse::unchanged(Some(ActivityId::new("evt-10").unwrap()));
        response.changes.insert(
            ScopeId::new("orgA").unwrap(),
            ScopeChanges {
                seq: 6,
                m_seq: 2,
                deleted_ids: vec![EntityId::new("p1").unwrap()],
            },
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            json!({
                "changes": {"orgA": {"seq": 6, "mSeq": 2, "deletedIds": ["p1"]}},
                "cursor": "evt-10"
            })
        );
    }
}
