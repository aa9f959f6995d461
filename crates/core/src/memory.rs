//! In-process implementation of every store trait.
//!
//! Used by tests across the workspace and for running the API without a
//! database. Call counters and a failure switch make engine behavior
//! observable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::duplicate_detection::recorder::{compute_integrity_hash, MatchLog, NewMatchLog};
use crate::duplicate_detection::store::{AuditSink, RecordStore, RuleStore};
use crate::error::{CoreError, EngineError};
use crate::match_rule::{
    apply_update, sort_by_priority, FieldGroup, MatchRule, NewMatchRule, UpdateMatchRule,
};
use crate::normalize::json_eq;
use crate::record::{FieldPath, Record};
use crate::types::{DbId, FieldMap, TenantId};

#[derive(Default)]
struct Inner {
    records: HashMap<(TenantId, String), Vec<Record>>,
    rules: Vec<MatchRule>,
    logs: Vec<MatchLog>,
    next_record_id: DbId,
    next_rule_id: DbId,
    next_log_id: DbId,
}

/// Thread-safe in-memory record, rule, and audit store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
    list_all_calls: AtomicUsize,
    query_equal_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`EngineError::StoreUnavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().expect("latency lock poisoned") = latency;
    }

    pub fn list_all_calls(&self) -> usize {
        self.list_all_calls.load(Ordering::SeqCst)
    }

    pub fn query_equal_calls(&self) -> usize {
        self.query_equal_calls.load(Ordering::SeqCst)
    }

    /// Insert a record and return it with its assigned id.
    pub fn insert_record(&self, tenant_id: TenantId, entity_type: &str, fields: FieldMap) -> Record {
        let mut inner = self.lock();
        inner.next_record_id += 1;
        let record = Record::new(inner.next_record_id, fields);
        inner
            .records
            .entry((tenant_id, entity_type.to_string()))
            .or_default()
            .push(record.clone());
        record
    }

    /// Insert a rule as-is (no validation), assigning a fresh id.
    pub fn insert_rule(&self, mut rule: MatchRule) -> MatchRule {
        let mut inner = self.lock();
        inner.next_rule_id += 1;
        rule.id = inner.next_rule_id;
        inner.rules.push(rule.clone());
        rule
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    async fn gate(&self) -> Result<(), EngineError> {
        let latency = *self.latency.lock().expect("latency lock poisoned");
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::StoreUnavailable(
                "memory store marked unavailable".into(),
            ));
        }
        Ok(())
    }

    fn ensure_unique_name(
        inner: &Inner,
        tenant_id: TenantId,
        entity_type: &str,
        name: &str,
        except: Option<DbId>,
    ) -> Result<(), EngineError> {
        let taken = inner.rules.iter().any(|r| {
            r.tenant_id == tenant_id
                && r.entity_type == entity_type
                && r.name == name
                && Some(r.id) != except
        });
        if taken {
            return Err(CoreError::Conflict(format!(
                "A {entity_type} match rule named '{name}' already exists"
            ))
            .into());
        }
        Ok(())
    }

    fn records_for(&self, tenant_id: TenantId, entity_type: &str) -> Vec<Record> {
        self.lock()
            .records
            .get(&(tenant_id, entity_type.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query_equal(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
        filters: &[(FieldPath, Value)],
    ) -> Result<Vec<Record>, EngineError> {
        self.query_equal_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self
            .records_for(tenant_id, entity_type)
            .into_iter()
            .filter(|r| {
                filters
                    .iter()
                    .all(|(path, value)| r.get(path).is_some_and(|actual| json_eq(actual, value)))
            })
            .collect())
    }

    async fn list_all(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<Record>, EngineError> {
        self.list_all_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.records_for(tenant_id, entity_type))
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_active_rules_by_priority(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<MatchRule>, EngineError> {
        self.gate().await?;
        let mut rules: Vec<MatchRule> = self
            .lock()
            .rules
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.entity_type == entity_type && r.is_active)
            .cloned()
            .collect();
        sort_by_priority(&mut rules);
        Ok(rules)
    }

    async fn list_rules(
        &self,
        tenant_id: TenantId,
        entity_type: Option<&str>,
    ) -> Result<Vec<MatchRule>, EngineError> {
        self.gate().await?;
        let mut rules: Vec<MatchRule> = self
            .lock()
            .rules
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| entity_type.map_or(true, |e| r.entity_type == e))
            .cloned()
            .collect();
        sort_by_priority(&mut rules);
        Ok(rules)
    }

    async fn get_rule(
        &self,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<MatchRule>, EngineError> {
        self.gate().await?;
        Ok(self
            .lock()
            .rules
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .cloned())
    }

    async fn create_rule(
        &self,
        tenant_id: TenantId,
        body: &NewMatchRule,
        field_groups: &[FieldGroup],
    ) -> Result<MatchRule, EngineError> {
        self.gate().await?;
        Self::ensure_unique_name(&self.lock(), tenant_id, &body.entity_type, &body.name, None)?;
        Ok(self.insert_rule(MatchRule {
            id: 0,
            tenant_id,
            entity_type: body.entity_type.clone(),
            name: body.name.clone(),
            description: body.description.clone(),
            field_groups: field_groups.to_vec(),
            match_logic: body.match_logic,
            is_active: body.is_active.unwrap_or(true),
            priority: body.priority,
        }))
    }

    async fn update_rule(
        &self,
        tenant_id: TenantId,
        id: DbId,
        body: &UpdateMatchRule,
        field_groups: Option<&[FieldGroup]>,
    ) -> Result<Option<MatchRule>, EngineError> {
        self.gate().await?;
        let mut inner = self.lock();
        let Some(idx) = inner
            .rules
            .iter()
            .position(|r| r.tenant_id == tenant_id && r.id == id)
        else {
            return Ok(None);
        };
        if let Some(name) = &body.name {
            let entity_type = inner.rules[idx].entity_type.clone();
            Self::ensure_unique_name(&inner, tenant_id, &entity_type, name, Some(id))?;
        }
        let rule = &mut inner.rules[idx];
        apply_update(rule, body, field_groups.map(<[FieldGroup]>::to_vec));
        Ok(Some(rule.clone()))
    }

    async fn delete_rule(&self, tenant_id: TenantId, id: DbId) -> Result<bool, EngineError> {
        self.gate().await?;
        let mut inner = self.lock();
        let before = inner.rules.len();
        inner
            .rules
            .retain(|r| !(r.tenant_id == tenant_id && r.id == id));
        Ok(inner.rules.len() != before)
    }

    async fn count_rules(&self, tenant_id: TenantId) -> Result<i64, EngineError> {
        self.gate().await?;
        let count = self
            .lock()
            .rules
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append(&self, entry: &NewMatchLog) -> Result<MatchLog, EngineError> {
        self.gate().await?;
        let mut inner = self.lock();
        let prev_hash = inner
            .logs
            .iter()
            .rev()
            .find(|l| l.tenant_id == entry.tenant_id)
            .map(|l| l.integrity_hash.clone());
        inner.next_log_id += 1;
        let log = MatchLog {
            id: inner.next_log_id,
            tenant_id: entry.tenant_id,
            entity_type: entry.entity_type.clone(),
            candidate_record_id: entry.candidate_record_id,
            matched_record_id: entry.matched_record_id,
            matched_fields: entry.matched_fields.clone(),
            rule_id: entry.rule_id,
            confidence_score: entry.confidence_score,
            user_id: entry.user_id,
            user_action: entry.user_action,
            actioned_at: entry.actioned_at,
            integrity_hash: compute_integrity_hash(prev_hash.as_deref(), entry),
            created_at: Utc::now(),
        };
        inner.logs.push(log.clone());
        Ok(log)
    }

    async fn list_for_tenant(
        &self,
        tenant_id: TenantId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchLog>, EngineError> {
        self.gate().await?;
        let skip = usize::try_from(offset.max(0)).unwrap_or(0);
        let take = usize::try_from(limit.max(0)).unwrap_or(0);
        Ok(self
            .lock()
            .logs
            .iter()
            .rev()
            .filter(|l| l.tenant_id == tenant_id)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }
}
