//! PostgreSQL implementation of the counter and activity log ports.
//!
//! Reads `context_counters` and `activities` (see `migrations/`). Every query
//! takes its scope list as one array bind, so a catch-up costs a fixed number
//! of round trips regardless of how many scopes a client follows.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{ActivityId, DomainError, EntityId, ScopeId};
use crate::domain::sync::{ContextCounter, DeletedEntity, DeletionScan};
use crate::ports::{ActivityLogReader, ContextCounterReader};

pub struct PostgresActivityLogReader {
    pool: PgPool,
}

impl PostgresActivityLogReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CounterRow {
    context_key: String,
    seq: i64,
    m_seq: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct DeletionRow {
    scope_id: String,
    entity_id: String,
}

impl CounterRow {
    fn into_entry(self) -> Result<(ScopeId, ContextCounter), DomainError> {
        let scope_id = ScopeId::new(self.context_key)
            .map_err(|e| DomainError::database("Invalid context_key", e))?;
        Ok((scope_id, ContextCounter::new(non_negative(self.seq), non_negative(self.m_seq))))
    }
}

impl TryFrom<DeletionRow> for DeletedEntity {
    type Error = DomainError;

    fn try_from(row: DeletionRow) -> Result<Self, Self::Error> {
        Ok(DeletedEntity {
            scope_id: ScopeId::new(row.scope_id)
                .map_err(|e| DomainError::database("Invalid scope_id", e))?,
            entity_id: EntityId::new(row.entity_id)
                .map_err(|e| DomainError::database("Invalid entity_id", e))?,
        })
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn scope_keys(scope_ids: &[ScopeId]) -> Vec<String> {
    scope_ids.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl ContextCounterReader for PostgresActivityLogReader {
    async fn fetch_counters(
        &self,
        scope_ids: &[ScopeId],
    ) -> Result<HashMap<ScopeId, ContextCounter>, DomainError> {
        if scope_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<CounterRow> = sqlx::query_as(
            r#"
            SELECT context_key, seq, m_seq
            FROM context_counters
            WHERE context_key = ANY($1)
            "#,
        )
        .bind(scope_keys(scope_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch context counters", e))?;

        rows.into_iter().map(CounterRow::into_entry).collect()
    }
}

#[async_trait]
impl ActivityLogReader for PostgresActivityLogReader {
    async fn scan_deletions(&self, scan: &DeletionScan) -> Result<Vec<DeletedEntity>, DomainError> {
        if scan.scope_ids.is_empty() || scan.entity_types.is_empty() || scan.limit == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<DeletionRow> = sqlx::query_as(
            r#"
            SELECT scope_id, entity_id
            FROM activities
            WHERE id > $1
              AND scope_id = ANY($2)
              AND entity_type = ANY($3)
              AND action = 'delete'
            ORDER BY id
            LIMIT $4
            "#,
        )
        .bind(scan.after.as_str())
        .bind(scope_keys(&scan.scope_ids))
        .bind(scan.entity_types.clone())
        .bind(i64::from(scan.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to scan deletions", e))?;

        rows.into_iter().map(DeletedEntity::try_from).collect()
    }

    async fn latest_activity_id(
        &self,
        scope_ids: &[ScopeId],
    ) -> Result<Option<ActivityId>, DomainError> {
        if scope_ids.is_empty() {
            return Ok(None);
        }

        let latest: Option<String> = sqlx::query_scalar(
            r#"
            SELECT MAX(id)
            FROM activities
            WHERE scope_id = ANY($1)
            "#,
        )
        .bind(scope_keys(scope_ids))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to read latest activity id", e))?;

        latest
            .map(ActivityId::new)
            .transpose()
            .map_err(|e| DomainError::database("Invalid activity id", e))
    }
}
