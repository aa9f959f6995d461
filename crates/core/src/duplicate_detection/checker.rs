//! Priority-ordered rule orchestration.
//!
//! Rules run strictly one after another in descending priority. The first
//! rule that yields any match decides the result and later rules are never
//! evaluated, so exactly one rule's matches reach the reviewer per check.

use std::sync::Arc;
use std::time::Duration;

use crate::duplicate_detection::evaluator::{FieldGroupEvaluator, RuleEvaluator};
use crate::duplicate_detection::store::{with_deadline, RecordStore, RuleStore};
use crate::duplicate_detection::EvaluationResult;
use crate::error::EngineError;
use crate::match_rule::sort_by_priority;
use crate::record::CandidateRecord;
use crate::types::TenantId;

/// Default deadline for each store call made during a check.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Engine tuning.
#[derive(Debug, Clone, Copy)]
pub struct CheckerConfig {
    /// Deadline applied to each rule-store and record-store call.
    pub store_timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Entry point for duplicate checks. Stateless and cheap to share.
#[derive(Clone)]
pub struct DuplicateChecker {
    rules: Arc<dyn RuleStore>,
    evaluator: Arc<dyn RuleEvaluator>,
    config: CheckerConfig,
}

impl DuplicateChecker {
    /// Build a checker using the default [`FieldGroupEvaluator`].
    pub fn new(
        records: Arc<dyn RecordStore>,
        rules: Arc<dyn RuleStore>,
        config: CheckerConfig,
    ) -> Self {
        let evaluator = Arc::new(FieldGroupEvaluator::new(records, config.store_timeout));
        Self::with_evaluator(rules, evaluator, config)
    }

    /// Build a checker around a custom evaluator.
    pub fn with_evaluator(
        rules: Arc<dyn RuleStore>,
        evaluator: Arc<dyn RuleEvaluator>,
        config: CheckerConfig,
    ) -> Self {
        Self {
            rules,
            evaluator,
            config,
        }
    }

    /// Run the check for a candidate about to be created.
    ///
    /// Malformed rules are skipped. Store failures and timeouts propagate;
    /// use [`Self::check_or_fail_open`] for the standard policy.
    pub async fn check_for_duplicates(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
        candidate: &CandidateRecord,
    ) -> Result<EvaluationResult, EngineError> {
        if tenant_id <= 0 {
            return Err(EngineError::MissingTenantContext);
        }

        let mut rules = with_deadline(
            "list_active_rules_by_priority",
            self.config.store_timeout,
            self.rules
                .list_active_rules_by_priority(tenant_id, entity_type),
        )
        .await?;

        if rules.is_empty() {
            tracing::debug!(tenant_id, entity_type, "No active match rules configured");
            return Ok(EvaluationResult::none());
        }

        // Stores promise this order; re-sorting is stable and keeps ties deterministic.
        sort_by_priority(&mut rules);

        for rule in rules.iter().filter(|r| r.is_active) {
            if let Err(e) = rule.ensure_well_formed() {
                tracing::debug!(rule_id = rule.id, error = %e, "Skipping malformed match rule");
                continue;
            }

            let matches = self.evaluator.evaluate(tenant_id, rule, candidate).await?;
            if !matches.is_empty() {
                tracing::info!(
                    tenant_id,
                    entity_type,
                    rule_id = rule.id,
                    match_count = matches.len(),
                    "Duplicate check matched"
                );
                return Ok(EvaluationResult::decided_by(rule.id, matches));
            }
        }

        Ok(EvaluationResult::none())
    }

    /// Run the check, treating infrastructure failures as "no duplicates".
    ///
    /// A missing tenant, an unreachable store, or a timed-out call never
    /// blocks record creation; each is logged at `warn`. Other errors are
    /// logged at `error` and also resolve to "no duplicates", since the check
    /// is advisory.
    pub async fn check_or_fail_open(
        &self,
        tenant_id: Option<TenantId>,
        entity_type: &str,
        candidate: &CandidateRecord,
    ) -> EvaluationResult {
        let Some(tenant_id) = tenant_id else {
            tracing::warn!(entity_type, "Duplicate check skipped: no tenant context");
            return EvaluationResult::none();
        };

        match self
            .check_for_duplicates(tenant_id, entity_type, candidate)
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_fail_open() => {
                tracing::warn!(
                    tenant_id,
                    entity_type,
                    error = %e,
                    "Duplicate check failed open"
                );
                EvaluationResult::none()
            }
            Err(e) => {
                tracing::error!(
                    tenant_id,
                    entity_type,
                    error = %e,
                    "Duplicate check failed, reporting no duplicates"
                );
                EvaluationResult::none()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::duplicate_detection::DuplicateMatch;
    use crate::match_rule::{FieldGroup, MatchLogic, MatchRule};
    use crate::memory::MemoryStore;
    use crate::types::{DbId, FieldMap};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    const TENANT: TenantId = 7;

    fn map(value: Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    fn rule(priority: i32, logic: MatchLogic, groups: Vec<FieldGroup>) -> MatchRule {
        MatchRule {
            id: 0,
            tenant_id: TENANT,
            entity_type: "leads".into(),
            name: format!("p{priority}"),
            description: None,
            field_groups: groups,
            match_logic: logic,
            is_active: true,
            priority,
        }
    }

    fn checker(store: &Arc<MemoryStore>) -> DuplicateChecker {
        DuplicateChecker::new(store.clone(), store.clone(), CheckerConfig::default())
    }

    /// Wraps the real evaluator and records which rules it was asked to run.
    struct SpyEvaluator {
        inner: FieldGroupEvaluator,
        evaluated: Mutex<Vec<DbId>>,
    }

    #[async_trait]
    impl RuleEvaluator for SpyEvaluator {
        async fn evaluate(
            &self,
            tenant_id: TenantId,
            rule: &MatchRule,
            candidate: &CandidateRecord,
        ) -> Result<Vec<DuplicateMatch>, EngineError> {
            self.evaluated.lock().unwrap().push(rule.id);
            self.inner.evaluate(tenant_id, rule, candidate).await
        }
    }

    // -- No rules ------------------------------------------------------------

    #[tokio::test]
    async fn no_rules_means_no_duplicates() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "x@y.z"})));

        for fields in [json!({"email": "x@y.z"}), json!({}), json!({"phone": "1"})] {
            let candidate = CandidateRecord::new(map(fields));
            let result = checker(&store)
                .check_for_duplicates(TENANT, "leads", &candidate)
                .await
                .unwrap();
            assert_eq!(result, EvaluationResult::none());
        }
    }

    // -- Short-circuit -------------------------------------------------------

    #[tokio::test]
    async fn first_matching_rule_decides_and_later_rules_never_run() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "x@y.z", "phone": "555"})));
        let low = store.insert_rule(rule(5, MatchLogic::Any, vec![["phone"].into()]));
        let high = store.insert_rule(rule(10, MatchLogic::Any, vec![["email"].into()]));

        let spy = Arc::new(SpyEvaluator {
            inner: FieldGroupEvaluator::new(store.clone(), Duration::from_secs(1)),
            evaluated: Mutex::new(Vec::new()),
        });
        let checker =
            DuplicateChecker::with_evaluator(store.clone(), spy.clone(), CheckerConfig::default());

        let candidate = CandidateRecord::new(map(json!({"email": "x@y.z", "phone": "555"})));
        let result = checker
            .check_for_duplicates(TENANT, "leads", &candidate)
            .await
            .unwrap();

        assert!(result.has_duplicates);
        assert_eq!(result.deciding_rule_id, Some(high.id));
        let evaluated = spy.evaluated.lock().unwrap().clone();
        assert_eq!(evaluated, vec![high.id]);
        assert!(!evaluated.contains(&low.id));
    }

    #[tokio::test]
    async fn falls_through_to_lower_priority_rule() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "old@y.z", "phone": "555"})));
        store.insert_rule(rule(10, MatchLogic::Any, vec![["email"].into()]));
        let phone = store.insert_rule(rule(9, MatchLogic::Any, vec![["phone"].into()]));

        let candidate = CandidateRecord::new(map(json!({"email": "new@y.z", "phone": "555"})));
        let result = checker(&store)
            .check_for_duplicates(TENANT, "leads", &candidate)
            .await
            .unwrap();

        assert_eq!(result.deciding_rule_id, Some(phone.id));
        assert_eq!(result.matches.len(), 1);
        // The reporter still shows only the deciding rule's fields.
        assert_eq!(result.matches[0].matched_fields.len(), 1);
    }

    #[tokio::test]
    async fn no_match_at_any_priority_is_none() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "old@y.z"})));
        store.insert_rule(rule(10, MatchLogic::Any, vec![["email"].into()]));
        store.insert_rule(rule(1, MatchLogic::All, vec![["email"].into()]));

        let candidate = CandidateRecord::new(map(json!({"email": "new@y.z"})));
        let result = checker(&store)
            .check_for_duplicates(TENANT, "leads", &candidate)
            .await
            .unwrap();

        assert_eq!(result, EvaluationResult::none());
    }

    // -- Rule hygiene --------------------------------------------------------

    #[tokio::test]
    async fn malformed_and_inactive_rules_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "x@y.z"})));
        store.insert_rule(rule(20, MatchLogic::Any, vec![]));
        store.insert_rule(rule(15, MatchLogic::Any, vec![FieldGroup::default()]));
        let mut inactive = rule(12, MatchLogic::Any, vec![["email"].into()]);
        inactive.is_active = false;
        store.insert_rule(inactive);
        let valid = store.insert_rule(rule(1, MatchLogic::Any, vec![["email"].into()]));

        let candidate = CandidateRecord::new(map(json!({"email": "X@Y.Z"})));
        let result = checker(&store)
            .check_for_duplicates(TENANT, "leads", &candidate)
            .await
            .unwrap();

        assert_eq!(result.deciding_rule_id, Some(valid.id));
    }

    #[tokio::test]
    async fn rules_of_other_entity_types_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "contacts", map(json!({"email": "x@y.z"})));
        let mut contact_rule = rule(10, MatchLogic::Any, vec![["email"].into()]);
        contact_rule.entity_type = "contacts".into();
        store.insert_rule(contact_rule);

        let candidate = CandidateRecord::new(map(json!({"email": "x@y.z"})));
        let result = checker(&store)
            .check_for_duplicates(TENANT, "leads", &candidate)
            .await
            .unwrap();

        assert!(!result.has_duplicates);
    }

    // -- Failures ------------------------------------------------------------

    #[tokio::test]
    async fn invalid_tenant_is_missing_context() {
        let store = Arc::new(MemoryStore::new());
        let result = checker(&store)
            .check_for_duplicates(0, "leads", &CandidateRecord::default())
            .await;
        assert_matches!(result, Err(EngineError::MissingTenantContext));
    }

    #[tokio::test]
    async fn unavailable_store_propagates_from_strict_check() {
        let store = Arc::new(MemoryStore::new());
        store.insert_rule(rule(10, MatchLogic::Any, vec![["email"].into()]));
        store.set_unavailable(true);

        let result = checker(&store)
            .check_for_duplicates(TENANT, "leads", &CandidateRecord::default())
            .await;
        assert_matches!(result, Err(EngineError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn fail_open_swallows_store_failures() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "x@y.z"})));
        store.insert_rule(rule(10, MatchLogic::Any, vec![["email"].into()]));
        store.set_unavailable(true);

        let candidate = CandidateRecord::new(map(json!({"email": "x@y.z"})));
        let result = checker(&store)
            .check_or_fail_open(Some(TENANT), "leads", &candidate)
            .await;
        assert_eq!(result, EvaluationResult::none());
    }

    #[tokio::test]
    async fn fail_open_without_tenant_reports_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "x@y.z"})));
        store.insert_rule(rule(10, MatchLogic::Any, vec![["email"].into()]));

        let candidate = CandidateRecord::new(map(json!({"email": "x@y.z"})));
        let result = checker(&store)
            .check_or_fail_open(None, "leads", &candidate)
            .await;
        assert_eq!(result, EvaluationResult::none());
        assert_eq!(store.list_all_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out_and_fails_open() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(TENANT, "leads", map(json!({"email": "x@y.z"})));
        store.insert_rule(rule(10, MatchLogic::Any, vec![["email"].into()]));
        store.set_latency(Some(Duration::from_secs(10)));

        let checker = DuplicateChecker::new(
            store.clone(),
            store.clone(),
            CheckerConfig {
                store_timeout: Duration::from_millis(50),
            },
        );
        let candidate = CandidateRecord::new(map(json!({"email": "x@y.z"})));

        let strict = checker.check_for_duplicates(TENANT, "leads", &candidate).await;
        assert_matches!(strict, Err(EngineError::Timeout { .. }));

        let lenient = checker
            .check_or_fail_open(Some(TENANT), "leads", &candidate)
            .await;
        assert!(!lenient.has_duplicates);
    }
}
