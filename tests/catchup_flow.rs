//! Catch-up reconciliation against a log-backed store.
//!
//! The store derives counters from its rows the way the database maintains
//! them, so each test reads as a sequence of writes followed by what a
//! reconnecting client is told.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use activity_relay::application::CatchupReconciler;
use activity_relay::domain::activity::{EventCatalog, TrackedKind};
use activity_relay::domain::foundation::{ActivityId, DomainError, EntityId, ScopeId};
use activity_relay::domain::sync::{
    CatchupRequest, CatchupResponse, ContextCounter, DeletedEntity, DeletionScan,
};
use activity_relay::ports::{ActivityLogReader, ContextCounterReader};

// =============================================================================
// Test Infrastructure
// =============================================================================

#[derive(Debug, Clone)]
struct Row {
    id: String,
    scope: String,
    entity_type: String,
    entity_id: String,
    action: &'static str,
}

struct LogStore {
    catalog: Arc<EventCatalog>,
    rows: Mutex<Vec<Row>>,
    next_id: Mutex<u64>,
}

impl LogStore {
    fn new(catalog: Arc<EventCatalog>) -> Self {
        Self {
            catalog,
            rows: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    fn append(&self, scope: &str, entity_type: &str, entity_id: &str, action: &'static str) -> String {
        let mut next = self.next_id.lock().unwrap();
        let id = format!("{:010}", *next);
        *next += 1;
        self.rows.lock().unwrap().push(Row {
            id: id.clone(),
            scope: scope.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action,
        });
        id
    }
}

#[async_trait]
impl ContextCounterReader for LogStore {
    async fn fetch_counters(
        &self,
        scope_ids: &[ScopeId],
    ) -> Result<HashMap<ScopeId, ContextCounter>, DomainError> {
        let product = self.catalog.product_entity_types();
        let membership = self.catalog.types_of_kind(TrackedKind::Membership);
        let rows = self.rows.lock().unwrap();

        let mut counters = HashMap::new();
        for scope_id in scope_ids {
            let mut counter = ContextCounter::default();
            for row in rows.iter().filter(|r| r.scope == scope_id.as_str()) {
                if product.contains(&row.entity_type) {
                    counter.seq += 1;
                } else if membership.contains(&row.entity_type) {
                    counter.m_seq += 1;
                }
            }
            if counter != ContextCounter::default() {
                counters.insert(scope_id.clone(), counter);
            }
        }
        Ok(counters)
    }
}

#[async_trait]
impl ActivityLogReader for LogStore {
    async fn scan_deletions(&self, scan: &DeletionScan) -> Result<Vec<DeletedEntity>, DomainError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.id.as_str() > scan.after.as_str())
            .filter(|r| r.action == "delete")
            .filter(|r| scan.scope_ids.iter().any(|s| s.as_str() == r.scope))
            .filter(|r| scan.entity_types.contains(&r.entity_type))
            .take(scan.limit as usize)
            .map(|r| DeletedEntity {
                scope_id: ScopeId::new(r.scope.clone()).unwrap(),
                entity_id: EntityId::new(r.entity_id.clone()).unwrap(),
            })
            .collect())
    }

    async fn latest_activity_id(
        &self,
        scope_ids: &[ScopeId],
    ) -> Result<Option<ActivityId>, DomainError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| scope_ids.iter().any(|s| s.as_str() == r.scope))
            .map(|r| r.id.clone())
            .max()
            .map(|id| ActivityId::new(id).unwrap()))
    }
}

fn setup() -> (Arc<LogStore>, CatchupReconciler) {
    let catalog = Arc::new(
        EventCatalog::new([
            ("organization", TrackedKind::ContextEntity),
            ("page", TrackedKind::ProductEntity),
            ("attachment", TrackedKind::ProductEntity),
            ("membership", TrackedKind::Membership),
        ])
        .unwrap(),
    );
    let store = Arc::new(LogStore::new(catalog.clone()));
    let reconciler = CatchupReconciler::new(store.clone(), store.clone(), catalog);
    (store, reconciler)
}

fn request(body: serde_json::Value) -> CatchupRequest {
    serde_json::from_value(body).unwrap()
}

/// The counters map a client would send back after applying a response.
fn remembered(response: &CatchupResponse) -> serde_json::Value {
    let mut wire = serde_json::Map::new();
    for (scope, changes) in &response.changes {
        wire.insert(scope.to_string(), json!(changes.seq));
        wire.insert(format!("{}:m", scope), json!(changes.m_seq));
    }
    serde_json::Value::Object(wire)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn fresh_client_gets_a_baseline_for_every_scope() {
    let (store, reconciler) = setup();
    store.append("org1", "page", "p1", "create");
    store.append("org1", "membership", "m1", "create");
    let last = store.append("org2", "page", "p9", "create");

    let response = reconciler
        .reconcile(request(json!({"scopeIds": ["org1", "org2", "org3"], "cursor": null})))
        .await
        .unwrap();

    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["changes"]["org1"], json!({"seq": 1, "mSeq": 1, "deletedIds": []}));
    assert_eq!(body["changes"]["org2"]["seq"], 1);
    assert_eq!(body["changes"]["org3"], json!({"seq": 0, "mSeq": 0, "deletedIds": []}));
    assert_eq!(body["cursor"], json!(last));
}

#[tokio::test]
async fn reconnecting_client_learns_counters_and_deleted_entities() {
    let (store, reconciler) = setup();
    store.append("org1", "page", "p1", "create");
    store.append("org1", "page", "p2", "create");
    store.append("org2", "page", "p9", "create");
    let baseline = reconciler
        .reconcile(request(json!({"scopeIds": ["org1", "org2"]})))
        .await
        .unwrap();

    store.append("org1", "page", "p2", "delete");
    store.append("org1", "organization", "org1", "delete");
    let last = store.append("org1", "membership", "m4", "create");

    let response = reconciler
        .reconcile(request(json!({
            "scopeIds": ["org1", "org2"],
            "cursor": baseline.cursor,
            "clientCounters": remembered(&baseline),
        })))
        .await
        .unwrap();

    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["changes"]["org1"], json!({"seq": 3, "mSeq": 1, "deletedIds": ["p2"]}));
    assert!(body["changes"].get("org2").is_none());
    assert_eq!(body["cursor"], json!(last));
}

#[tokio::test]
async fn membership_only_change_skips_the_deletion_scan() {
    let (store, reconciler) = setup();
    store.append("org1", "page", "p1", "create");
    let baseline = reconciler
        .reconcile(request(json!({"scopeIds": ["org1"]})))
        .await
        .unwrap();

    store.append("org1", "membership", "m1", "delete");

    let response = reconciler
        .reconcile(request(json!({
            "scopeIds": ["org1"],
            "cursor": baseline.cursor,
            "clientCounters": remembered(&baseline),
        })))
        .await
        .unwrap();

    let changes = &response.changes[&ScopeId::new("org1").unwrap()];
    assert_eq!(changes.m_seq, 1);
    assert!(changes.deleted_ids.is_empty());
}

#[tokio::test]
async fn up_to_date_client_gets_its_cursor_back() {
    let (store, reconciler) = setup();
    store.append("org1", "page", "p1", "create");
    let baseline = reconciler
        .reconcile(request(json!({"scopeIds": ["org1"]})))
        .await
        .unwrap();

    let response = reconciler
        .reconcile(request(json!({
            "scopeIds": ["org1"],
            "cursor": baseline.cursor,
            "clientCounters": remembered(&baseline),
        })))
        .await
        .unwrap();

    assert!(response.changes.is_empty());
    assert_eq!(response.cursor, baseline.cursor);
}

#[tokio::test]
async fn duplicate_scopes_are_reported_once() {
    let (store, reconciler) = setup();
    store.append("org1", "page", "p1", "create");

    let response = reconciler
        .reconcile(request(json!({"scopeIds": ["org1", "org1"]})))
        .await
        .unwrap();

    assert_eq!(response.changes.len(), 1);
}
