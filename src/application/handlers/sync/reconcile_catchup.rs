//! CatchupReconciler - computes what a reconnecting client missed.
//!
//! Instead of replaying the log, the reconciler compares per-scope counters
//! and only scans the log for deletions, which counters alone cannot convey:
//!
//! 1. Bulk-read `{seq, mSeq}` for every requested scope.
//! 2. A scope changed if either counter differs from the client's copy
//!    (every scope, when the client sent no counters).
//! 3. Scopes whose `seq` changed get one bounded scan for deleted business
//!    entities after the client's cursor. No cursor means a fresh baseline,
//!    so there is nothing to scan against.
//! 4. The new cursor is the latest log id for the scopes, except on a no-op
//!    poll where the client's cursor is echoed back.
//!
//! Storage errors propagate; a cursor computed from a partial read would make
//! the client skip changes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::domain::activity::EventCatalog;
use crate::domain::foundation::{DomainError, ScopeId};
use crate::domain::sync::{
    CatchupRequest, CatchupResponse, ClientCounters, DeletionScan, ScopeChanges,
    DELETION_SCAN_LIMIT,
};
use crate::ports::{ActivityLogReader, ContextCounterReader};

pub struct CatchupReconciler {
    counters: Arc<dyn ContextCounterReader>,
    log: Arc<dyn ActivityLogReader>,
    catalog: Arc<EventCatalog>,
    scan_limit: u32,
}

impl CatchupReconciler {
    pub fn new(
        counters: Arc<dyn ContextCounterReader>,
        log: Arc<dyn ActivityLogReader>,
        catalog: Arc<EventCatalog>,
    ) -> Self {
        Self {
            counters,
            log,
            catalog,
            scan_limit: DELETION_SCAN_LIMIT,
        }
    }

    /// Overrides the deletion scan cap.
    pub fn with_scan_limit(mut self, limit: u32) -> Self {
        self.scan_limit = limit;
        self
    }

    pub async fn reconcile(&self, request: CatchupRequest) -> Result<CatchupResponse, DomainError> {
        let client = request.client_counters();
        let CatchupRequest {
            scope_ids, cursor, ..
        } = request;

        if scope_ids.is_empty() {
            return Ok(CatchupResponse::unchanged(cursor));
        }

        let scope_ids: Vec<ScopeId> = scope_ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let server = self.counters.fetch_counters(&scope_ids).await?;

        let mut changes = BTreeMap::new();
        let mut seq_changed = Vec::new();
        for scope_id in &scope_ids {
            let current = server.get(scope_id).copied().unwrap_or_default();
            let known = client.as_ref().map(|c: &ClientCounters| c.get(scope_id));

            if known == Some(current) {
                continue;
            }
            if known.map(|k| k.seq != current.seq).unwrap_or(true) {
                seq_changed.push(scope_id.clone());
            }
            changes.insert(scope_id.clone(), ScopeChanges::from_counter(current));
        }

        if let Some(after) = cursor.as_ref() {
            if !seq_changed.is_empty() {
                let scan = DeletionScan {
                    after: after.clone(),
                    scope_ids: seq_changed,
                    entity_types: self.catalog.product_entity_types(),
                    limit: self.scan_limit,
                };
                for deleted in self.log.scan_deletions(&scan).await? {
                    if let Some(entry) = changes.get_mut(&deleted.scope_id) {
                        entry.deleted_ids.push(deleted.entity_id);
                    }
                }
            }
        }

        let cursor = if changes.is_empty() && cursor.is_some() {
            cursor
        } else {
            self.log.latest_activity_id(&scope_ids).await?.or(cursor)
        };

        debug!(
            scopes = scope_ids.len(),
            changed = changes.len(),
            "Catch-up reconciled"
        );

        Ok(CatchupResponse { changes, cursor })
    }
}
