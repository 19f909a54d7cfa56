//! Activity log ports - read access to counters and the append-only log.
//!
//! The store owns both; this crate only reads them. Errors are returned as
//! `DomainError` with `ErrorCode::DatabaseError` and are never swallowed by
//! callers, since the catch-up cursor is only correct if every read succeeded.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::foundation::{ActivityId, DomainError, ScopeId};
use crate::domain::sync::{ContextCounter, DeletedEntity, DeletionScan};

/// Keyed lookup of per-scope counters.
#[async_trait]
pub trait ContextCounterReader: Send + Sync {
    /// Fetches counters for all given scopes in one round trip.
    ///
    /// Scopes without a counter row are simply absent from the result.
    async fn fetch_counters(
        &self,
        scope_ids: &[ScopeId],
    ) -> Result<HashMap<ScopeId, ContextCounter>, DomainError>;
}

/// Bounded reads over the append-only activity log.
#[async_trait]
pub trait ActivityLogReader: Send + Sync {
    /// Deleted business entities after a cursor, ordered by log id,
    /// at most `scan.limit` rows.
    async fn scan_deletions(&self, scan: &DeletionScan) -> Result<Vec<DeletedEntity>, DomainError>;

    /// Highest log id among the given scopes, if any row exists.
    async fn latest_activity_id(
        &self,
        scope_ids: &[ScopeId],
    ) -> Result<Option<ActivityId>, DomainError>;
}
