//! Field-group evaluation for a single rule.
//!
//! ANY rules turn every fully populated field group into an independent
//! equality condition and scan the whole collection, since conditions over
//! different field subsets cannot be expressed as one indexed query. ALL rules
//! collapse every populated field into one conjunctive filter that the record
//! store answers directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::duplicate_detection::reporter::find_matched_fields;
use crate::duplicate_detection::store::{with_deadline, RecordStore};
use crate::duplicate_detection::{DuplicateMatch, EXACT_MATCH_CONFIDENCE};
use crate::error::EngineError;
use crate::match_rule::{MatchLogic, MatchRule};
use crate::normalize::{is_populated, normalize, normalized_eq};
use crate::record::{CandidateRecord, FieldPath, Record};
use crate::types::TenantId;

/// One ANY-logic condition: every `(path, normalized value)` must equal.
pub type Condition = Vec<(FieldPath, Value)>;

/// Evaluates one rule against one candidate.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        tenant_id: TenantId,
        rule: &MatchRule,
        candidate: &CandidateRecord,
    ) -> Result<Vec<DuplicateMatch>, EngineError>;
}

// ---------------------------------------------------------------------------
// Condition building
// ---------------------------------------------------------------------------

/// ANY logic: one condition per field group the candidate fully populates.
///
/// A group missing any of its fields is discarded, even if its other fields
/// are present.
pub fn any_conditions(rule: &MatchRule, candidate: &CandidateRecord) -> Vec<Condition> {
    rule.field_groups
        .iter()
        .filter_map(|group| {
            group
                .fields()
                .iter()
                .map(|path| {
                    let value = candidate.get(path).filter(|v| is_populated(Some(*v)))?;
                    Some((path.clone(), normalize(value)))
                })
                .collect::<Option<Condition>>()
        })
        .filter(|condition| !condition.is_empty())
        .collect()
}

/// ALL logic: every populated field across every group, with raw values.
pub fn all_filter(rule: &MatchRule, candidate: &CandidateRecord) -> Vec<(FieldPath, Value)> {
    rule.all_field_paths()
        .into_iter()
        .filter_map(|path| {
            let value = candidate.get(path)?;
            is_populated(Some(value)).then(|| (path.clone(), value.clone()))
        })
        .collect()
}

/// Whether `record` satisfies every pair of `condition` after normalization.
pub fn satisfies(record: &Record, condition: &Condition) -> bool {
    condition.iter().all(|(path, expected)| {
        record
            .get(path)
            .is_some_and(|actual| normalized_eq(actual, expected))
    })
}

// ---------------------------------------------------------------------------
// FieldGroupEvaluator
// ---------------------------------------------------------------------------

/// Default [`RuleEvaluator`] backed by a [`RecordStore`].
pub struct FieldGroupEvaluator {
    records: Arc<dyn RecordStore>,
    store_timeout: Duration,
}

impl FieldGroupEvaluator {
    pub fn new(records: Arc<dyn RecordStore>, store_timeout: Duration) -> Self {
        Self {
            records,
            store_timeout,
        }
    }

    async fn evaluate_any(
        &self,
        tenant_id: TenantId,
        rule: &MatchRule,
        candidate: &CandidateRecord,
    ) -> Result<Vec<Record>, EngineError> {
        let conditions = any_conditions(rule, candidate);
        if conditions.is_empty() {
            tracing::trace!(rule_id = rule.id, "No viable field group for candidate");
            return Ok(Vec::new());
        }

        let all = with_deadline(
            "list_all",
            self.store_timeout,
            self.records.list_all(tenant_id, &rule.entity_type),
        )
        .await?;

        Ok(all
            .into_iter()
            .filter(|record| conditions.iter().any(|c| satisfies(record, c)))
            .collect())
    }

    async fn evaluate_all(
        &self,
        tenant_id: TenantId,
        rule: &MatchRule,
        candidate: &CandidateRecord,
    ) -> Result<Vec<Record>, EngineError> {
        let filters = all_filter(rule, candidate);
        if filters.is_empty() {
            tracing::trace!(rule_id = rule.id, "Candidate supplies no matchable field");
            return Ok(Vec::new());
        }

        with_deadline(
            "query_equal",
            self.store_timeout,
            self.records
                .query_equal(tenant_id, &rule.entity_type, &filters),
        )
        .await
    }
}

#[async_trait]
impl RuleEvaluator for FieldGroupEvaluator {
    async fn evaluate(
        &self,
        tenant_id: TenantId,
        rule: &MatchRule,
        candidate: &CandidateRecord,
    ) -> Result<Vec<DuplicateMatch>, EngineError> {
        let records = match rule.match_logic {
            MatchLogic::Any => self.evaluate_any(tenant_id, rule, candidate).await?,
            MatchLogic::All => self.evaluate_all(tenant_id, rule, candidate).await?,
        };

        Ok(records
            .into_iter()
            // A saved candidate never duplicates itself.
            .filter(|record| Some(record.id) != candidate.id)
            .map(|record| DuplicateMatch {
                candidate_record_id: candidate.id,
                matched_record_id: record.id,
                matched_fields: find_matched_fields(&record, candidate, &rule.field_groups),
                matched_record_snapshot: record.fields,
                confidence_score: EXACT_MATCH_CONFIDENCE,
            })
            .collect())
    }
}
