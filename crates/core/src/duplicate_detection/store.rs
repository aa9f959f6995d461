//! Store seams consumed by the engine.
//!
//! Implementations live in `recordguard-db` (PostgreSQL) and
//! [`crate::memory`] (in-process). Every method is tenant-scoped; no store
//! call may return another tenant's data.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::duplicate_detection::recorder::{MatchLog, NewMatchLog};
use crate::error::EngineError;
use crate::match_rule::{FieldGroup, MatchRule, NewMatchRule, UpdateMatchRule};
use crate::record::{FieldPath, Record};
use crate::types::{DbId, TenantId};

/// Tenant-scoped access to existing records of one entity collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records whose value at every `(path, value)` pair equals `value` exactly.
    async fn query_equal(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
        filters: &[(FieldPath, Value)],
    ) -> Result<Vec<Record>, EngineError>;

    /// Every record of the collection, unfiltered.
    async fn list_all(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<Record>, EngineError>;
}

/// Match rule persistence.
///
/// The engine only needs [`RuleStore::list_active_rules_by_priority`]; the
/// remaining methods back the administration surface and the seeder.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules for the pair, descending priority, ties by ascending id.
    /// An empty list is a normal state, not an error.
    async fn list_active_rules_by_priority(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<MatchRule>, EngineError>;

    async fn list_rules(
        &self,
        tenant_id: TenantId,
        entity_type: Option<&str>,
    ) -> Result<Vec<MatchRule>, EngineError>;

    async fn get_rule(&self, tenant_id: TenantId, id: DbId)
        -> Result<Option<MatchRule>, EngineError>;

    /// Persist a rule. `field_groups` is the validated form of `body.field_groups`.
    async fn create_rule(
        &self,
        tenant_id: TenantId,
        body: &NewMatchRule,
        field_groups: &[FieldGroup],
    ) -> Result<MatchRule, EngineError>;

    /// Replace a rule's mutable columns. Returns `None` if it does not exist.
    async fn update_rule(
        &self,
        tenant_id: TenantId,
        id: DbId,
        body: &UpdateMatchRule,
        field_groups: Option<&[FieldGroup]>,
    ) -> Result<Option<MatchRule>, EngineError>;

    /// Returns `true` if a rule was deleted.
    async fn delete_rule(&self, tenant_id: TenantId, id: DbId) -> Result<bool, EngineError>;

    /// Number of rules the tenant has across all entity types.
    async fn count_rules(&self, tenant_id: TenantId) -> Result<i64, EngineError>;
}

/// Append-only sink for match decisions.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry, chaining its integrity hash onto the tenant's last entry.
    async fn append(&self, entry: &NewMatchLog) -> Result<MatchLog, EngineError>;

    /// Newest-first page of a tenant's match log.
    async fn list_for_tenant(
        &self,
        tenant_id: TenantId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchLog>, EngineError>;
}

/// Run a store call under a deadline, mapping expiry to [`EngineError::Timeout`].
pub async fn with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            operation,
            after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
