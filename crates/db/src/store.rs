//! PostgreSQL implementation of the engine's store traits.

use async_trait::async_trait;
use recordguard_core::duplicate_detection::{
    AuditSink, MatchLog, NewMatchLog, RecordStore, RuleStore,
};
use recordguard_core::error::{CoreError, EngineError};
use recordguard_core::match_rule::{FieldGroup, MatchRule, NewMatchRule, UpdateMatchRule};
use recordguard_core::record::{FieldPath, Record};
use recordguard_core::types::{DbId, TenantId};
use serde_json::Value;

use crate::models::match_rule::MatchRuleRow;
use crate::repositories::{MatchLogRepo, MatchRuleRepo, RecordRepo};
use crate::DbPool;

/// Store backed by a Postgres pool. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error from `operation` into the engine's error space.
///
/// Unique violations on `uq_` constraints become conflicts; everything else
/// means the store is unavailable.
fn store_error(operation: &'static str, err: sqlx::Error) -> EngineError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ))
                .into();
            }
        }
    }
    tracing::error!(operation, error = %err, "Database error");
    EngineError::StoreUnavailable(format!("{operation}: {err}"))
}

fn into_rules(rows: Vec<MatchRuleRow>) -> Result<Vec<MatchRule>, EngineError> {
    rows.into_iter()
        .map(|row| MatchRule::try_from(row).map_err(EngineError::from))
        .collect()
}

#[async_trait]
impl RecordStore for PgStore {
    async fn query_equal(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
        filters: &[(FieldPath, Value)],
    ) -> Result<Vec<Record>, EngineError> {
        let rows = RecordRepo::query_equal(&self.pool, tenant_id, entity_type, filters)
            .await
            .map_err(|e| store_error("query_equal", e))?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn list_all(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<Record>, EngineError> {
        let rows = RecordRepo::list_all(&self.pool, tenant_id, entity_type)
            .await
            .map_err(|e| store_error("list_all", e))?;
        Ok(rows.into_iter().map(Record::from).collect())
    }
}

#[async_trait]
impl RuleStore for PgStore {
    async fn list_active_rules_by_priority(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<MatchRule>, EngineError> {
        let rows = MatchRuleRepo::list_active_by_priority(&self.pool, tenant_id, entity_type)
            .await
            .map_err(|e| store_error("list_active_rules_by_priority", e))?;
        into_rules(rows)
    }

    async fn list_rules(
        &self,
        tenant_id: TenantId,
        entity_type: Option<&str>,
    ) -> Result<Vec<MatchRule>, EngineError> {
        let rows = MatchRuleRepo::list(&self.pool, tenant_id, entity_type)
            .await
            .map_err(|e| store_error("list_rules", e))?;
        into_rules(rows)
    }

    async fn get_rule(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<MatchRule>, EngineError> {
        MatchRuleRepo::find_by_id(&self.pool, tenant_id, id)
            .await
            .map_err(|e| store_error("get_rule", e))?
            .map(MatchRule::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn create_rule(
        &self,
        tenant_id: TenantId,
        body: &NewMatchRule,
        field_groups: &[FieldGroup],
    ) -> Result<MatchRule, EngineError> {
        let row = MatchRuleRepo::create(&self.pool, tenant_id, body, field_groups)
            .await
            .map_err(|e| store_error("create_rule", e))?;
        Ok(MatchRule::try_from(row)?)
    }

    async fn update_rule(
        &self,
        tenant_id: TenantId,
        id: DbId,
        body: &UpdateMatchRule,
        field_groups: Option<&[FieldGroup]>,
    ) -> Result<Option<MatchRule>, EngineError> {
        MatchRuleRepo::update(&self.pool, tenant_id, id, body, field_groups)
            .await
            .map_err(|e| store_error("update_rule", e))?
            .map(MatchRule::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn delete_rule(&self, tenant_id: TenantId, id: DbId) -> Result<bool, EngineError> {
        MatchRuleRepo::delete(&self.pool, tenant_id, id)
            .await
            .map_err(|e| store_error("delete_rule", e))
    }

    async fn count_rules(&self, tenant_id: TenantId) -> Result<i64, EngineError> {
        MatchRuleRepo::count(&self.pool, tenant_id)
            .await
            .map_err(|e| store_error("count_rules", e))
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn append(&self, entry: &NewMatchLog) -> Result<MatchLog, EngineError> {
        let row = MatchLogRepo::append(&self.pool, entry)
            .await
            .map_err(|e| EngineError::AuditWriteFailure(e.to_string()))?;
        Ok(MatchLog::try_from(row)?)
    }

    async fn list_for_tenant(
        &self,
        tenant_id: TenantId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchLog>, EngineError> {
        MatchLogRepo::list_for_tenant(&self.pool, tenant_id, limit, offset)
            .await
            .map_err(|e| store_error("list_match_logs", e))?
            .into_iter()
            .map(|row| MatchLog::try_from(row).map_err(EngineError::from))
            .collect()
    }
}
