//! Append-only log of human decisions on reported duplicates.
//!
//! An entry is written only when a reviewer acts on a shown match, never for
//! the check itself. Writes are fire-and-forget: a failed write is logged and
//! never blocks the create / view / cancel action that triggered it.
//!
//! Entries carry a per-tenant SHA-256 hash chain so tampering with stored
//! history is detectable with [`verify_chain`].

use std::fmt;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::duplicate_detection::store::AuditSink;
use crate::duplicate_detection::EXACT_MATCH_CONFIDENCE;
use crate::error::{CoreError, EngineError};
use crate::types::{DbId, FieldMap, TenantId, Timestamp};

/// Known seed value for the first entry in each tenant's chain.
const CHAIN_SEED: &str = "MATCH_LOG_CHAIN_SEED_V1";

// ---------------------------------------------------------------------------
// UserAction
// ---------------------------------------------------------------------------

/// What the reviewer chose after seeing a potential duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    /// Record creation proceeds.
    CreatedAnyway,
    /// Creation abandoned; the UI navigates to the existing record.
    Viewed,
    /// Creation abandoned, no navigation.
    Cancelled,
}

impl UserAction {
    pub const ALL: [UserAction; 3] = [Self::CreatedAnyway, Self::Viewed, Self::Cancelled];

    /// Database / wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAnyway => "created_anyway",
            Self::Viewed => "viewed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the database `user_action` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid user action '{name}'. Must be one of: created_anyway, viewed, cancelled"
                ))
            })
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DecisionOutcome
// ---------------------------------------------------------------------------

/// What the calling UI should do after a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub proceed_with_create: bool,
    /// Existing record to open, if any.
    pub navigate_to: Option<DbId>,
}

impl DecisionOutcome {
    /// Map an action to its effect. A pending decision (`None`) blocks creation.
    pub fn for_action(action: Option<UserAction>, matched_record_id: DbId) -> Self {
        match action {
            Some(UserAction::CreatedAnyway) => Self {
                proceed_with_create: true,
                navigate_to: None,
            },
            Some(UserAction::Viewed) => Self {
                proceed_with_create: false,
                navigate_to: Some(matched_record_id),
            },
            Some(UserAction::Cancelled) | None => Self {
                proceed_with_create: false,
                navigate_to: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A decision about to be appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMatchLog {
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub candidate_record_id: Option<DbId>,
    pub matched_record_id: DbId,
    pub matched_fields: FieldMap,
    pub rule_id: Option<DbId>,
    pub confidence_score: f64,
    pub user_id: Option<DbId>,
    pub user_action: Option<UserAction>,
    pub actioned_at: Option<Timestamp>,
}

/// A persisted, immutable decision (no `updated_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchLog {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub candidate_record_id: Option<DbId>,
    pub matched_record_id: DbId,
    pub matched_fields: FieldMap,
    pub rule_id: Option<DbId>,
    pub confidence_score: f64,
    pub user_id: Option<DbId>,
    pub user_action: Option<UserAction>,
    pub actioned_at: Option<Timestamp>,
    pub integrity_hash: String,
    pub created_at: Timestamp,
}

impl MatchLog {
    /// The hashed content of this entry.
    pub fn content(&self) -> NewMatchLog {
        NewMatchLog {
            tenant_id: self.tenant_id,
            entity_type: self.entity_type.clone(),
            candidate_record_id: self.candidate_record_id,
            matched_record_id: self.matched_record_id,
            matched_fields: self.matched_fields.clone(),
            rule_id: self.rule_id,
            confidence_score: self.confidence_score,
            user_id: self.user_id,
            user_action: self.user_action,
            actioned_at: self.actioned_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Integrity chain
// ---------------------------------------------------------------------------

/// `value` with object keys sorted at every depth.
fn sorted_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sorted_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

fn sorted_map(map: &FieldMap) -> Map<String, Value> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(k, v)| (k.clone(), sorted_keys(v)))
        .collect()
}

/// Canonical string form of an entry.
///
/// Object keys inside `matched_fields` are sorted at every depth so the form
/// survives a round trip through JSONB, which reorders keys.
pub fn canonical_entry(entry: &NewMatchLog) -> String {
    let matched = sorted_map(&entry.matched_fields);
    let canonical = serde_json::json!({
        "tenant_id": entry.tenant_id,
        "entity_type": entry.entity_type,
        "candidate_record_id": entry.candidate_record_id,
        "matched_record_id": entry.matched_record_id,
        "matched_fields": matched,
        "rule_id": entry.rule_id,
        "confidence_score": entry.confidence_score,
        "user_id": entry.user_id,
        "user_action": entry.user_action.map(UserAction::as_str),
        "actioned_at": entry.actioned_at.map(|t| t.timestamp_micros()),
    });
    canonical.to_string()
}

/// Hash for `entry` chained onto `prev_hash` (the tenant's previous entry).
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry: &NewMatchLog) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{}", canonical_entry(entry));
    format!("{:x}", Sha256::digest(combined.as_bytes()))
}

/// Verify a tenant's entries in insertion order.
///
/// Returns the id of the first entry whose hash does not match, or `None`
/// when the whole chain is intact.
pub fn verify_chain(entries: &[MatchLog]) -> Option<DbId> {
    let mut prev: Option<&str> = None;
    for entry in entries {
        let expected = compute_integrity_hash(prev, &entry.content());
        if expected != entry.integrity_hash {
            return Some(entry.id);
        }
        prev = Some(&entry.integrity_hash);
    }
    None
}

// ---------------------------------------------------------------------------
// AuditRecorder
// ---------------------------------------------------------------------------

/// Decision details supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub candidate_record_id: Option<DbId>,
    pub matched_record_id: DbId,
    #[serde(default)]
    pub matched_fields: FieldMap,
    pub rule_id: Option<DbId>,
    pub confidence_score: Option<f64>,
    pub user_id: Option<DbId>,
    pub user_action: Option<UserAction>,
}

/// Writes decisions to an [`AuditSink`].
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Build the entry for a decision, stamping `actioned_at` when acted upon.
    pub fn entry(tenant_id: TenantId, entity_type: &str, decision: Decision) -> NewMatchLog {
        // Stored timestamps have microsecond precision; hash what will be stored.
        let actioned_at = decision
            .user_action
            .map(|_| Utc::now().trunc_subsecs(6));
        NewMatchLog {
            tenant_id,
            entity_type: entity_type.to_string(),
            candidate_record_id: decision.candidate_record_id,
            matched_record_id: decision.matched_record_id,
            matched_fields: decision.matched_fields,
            rule_id: decision.rule_id,
            confidence_score: decision.confidence_score.unwrap_or(EXACT_MATCH_CONFIDENCE),
            user_id: decision.user_id,
            user_action: decision.user_action,
            actioned_at,
        }
    }

    /// Append an entry and wait for the result.
    pub async fn record(&self, entry: NewMatchLog) -> Result<MatchLog, EngineError> {
        if entry.tenant_id <= 0 {
            return Err(EngineError::MissingTenantContext);
        }
        self.sink.append(&entry).await.map_err(|e| match e {
            EngineError::AuditWriteFailure(_) => e,
            other => EngineError::AuditWriteFailure(other.to_string()),
        })
    }

    /// Fire-and-forget decision logging.
    ///
    /// The write runs on a spawned task; failures are logged at `error` and
    /// never reach the caller. The handle may be dropped.
    pub fn log_decision(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
        decision: Decision,
    ) -> JoinHandle<()> {
        let entry = Self::entry(tenant_id, entity_type, decision);
        let recorder = self.clone();
        tokio::spawn(async move {
            let matched_record_id = entry.matched_record_id;
            match recorder.record(entry).await {
                Ok(log) => tracing::debug!(
                    tenant_id,
                    match_log_id = log.id,
                    matched_record_id,
                    "Recorded duplicate decision"
                ),
                Err(e) => tracing::error!(
                    tenant_id,
                    matched_record_id,
                    error = %e,
                    "Failed to record duplicate decision"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn decision(action: Option<UserAction>) -> Decision {
        Decision {
            candidate_record_id: None,
            matched_record_id: 42,
            matched_fields: json!({"email": "x@y.z"}).as_object().cloned().unwrap(),
            rule_id: Some(3),
            confidence_score: None,
            user_id: Some(11),
            user_action: action,
        }
    }

    // -- UserAction ----------------------------------------------------------

    #[test]
    fn user_action_round_trips_names() {
        for action in UserAction::ALL {
            assert_eq!(UserAction::from_name(action.as_str()).unwrap(), action);
        }
        assert!(UserAction::from_name("merged").is_err());
    }

    #[test]
    fn user_action_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(UserAction::CreatedAnyway).unwrap(),
            json!("created_anyway")
        );
    }

    // -- DecisionOutcome -----------------------------------------------------

    #[test]
    fn outcomes_follow_the_chosen_action() {
        let create = DecisionOutcome::for_action(Some(UserAction::CreatedAnyway), 5);
        assert!(create.proceed_with_create);
        assert_eq!(create.navigate_to, None);

        let view = DecisionOutcome::for_action(Some(UserAction::Viewed), 5);
        assert!(!view.proceed_with_create);
        assert_eq!(view.navigate_to, Some(5));

        let cancel = DecisionOutcome::for_action(Some(UserAction::Cancelled), 5);
        assert!(!cancel.proceed_with_create);
        assert_eq!(cancel.navigate_to, None);
    }

    // -- Entries -------------------------------------------------------------

    #[test]
    fn entry_defaults_confidence_and_stamps_action_time() {
        let entry = AuditRecorder::entry(1, "leads", decision(Some(UserAction::Viewed)));
        assert_eq!(entry.confidence_score, 1.0);
        assert!(entry.actioned_at.is_some());

        let pending = AuditRecorder::entry(1, "leads", decision(None));
        assert_eq!(pending.actioned_at, None);
    }

    // -- Integrity chain -----------------------------------------------------

    #[test]
    fn canonical_form_ignores_field_order() {
        let mut a = AuditRecorder::entry(1, "leads", decision(None));
        let mut b = a.clone();
        a.matched_fields = json!({"email": "x", "phone": "1"}).as_object().cloned().unwrap();
        b.matched_fields = json!({"phone": "1", "email": "x"}).as_object().cloned().unwrap();
        assert_eq!(canonical_entry(&a), canonical_entry(&b));
    }

    #[test]
    fn nested_objects_verify_after_key_reordering() {
        let mut entry = AuditRecorder::entry(1, "leads", decision(Some(UserAction::Viewed)));
        entry.matched_fields = json!({
            "address": {"zip": "1", "city": "x"},
            "tags": [{"b": 2, "a": 1}]
        })
        .as_object()
        .cloned()
        .unwrap();
        let hash = compute_integrity_hash(None, &entry);

        // Keys as JSONB returns them.
        let mut stored = entry.clone();
        stored.matched_fields = json!({
            "address": {"city": "x", "zip": "1"},
            "tags": [{"a": 1, "b": 2}]
        })
        .as_object()
        .cloned()
        .unwrap();
        let log = MatchLog {
            id: 1,
            tenant_id: stored.tenant_id,
            entity_type: stored.entity_type.clone(),
            candidate_record_id: stored.candidate_record_id,
            matched_record_id: stored.matched_record_id,
            matched_fields: stored.matched_fields.clone(),
            rule_id: stored.rule_id,
            confidence_score: stored.confidence_score,
            user_id: stored.user_id,
            user_action: stored.user_action,
            actioned_at: stored.actioned_at,
            integrity_hash: hash,
            created_at: Utc::now(),
        };

        assert_eq!(verify_chain(&[log]), None);
    }

    #[test]
    fn integrity_hash_is_hex_sha256() {
        let entry = AuditRecorder::entry(1, "leads", decision(None));
        let hash = compute_integrity_hash(None, &entry);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash, compute_integrity_hash(Some(&hash), &entry));
    }

    #[tokio::test]
    async fn appended_entries_form_a_valid_chain() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());

        for action in UserAction::ALL {
            let entry = AuditRecorder::entry(1, "leads", decision(Some(action)));
            recorder.record(entry).await.unwrap();
        }

        let mut logs = store.list_for_tenant(1, 50, 0).await.unwrap();
        logs.reverse();
        assert_eq!(logs.len(), 3);
        assert_eq!(verify_chain(&logs), None);
    }

    #[tokio::test]
    async fn tampering_breaks_the_chain() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        for _ in 0..3 {
            let entry = AuditRecorder::entry(1, "leads", decision(Some(UserAction::Viewed)));
            recorder.record(entry).await.unwrap();
        }

        let mut logs = store.list_for_tenant(1, 50, 0).await.unwrap();
        logs.reverse();
        logs[1].user_action = Some(UserAction::CreatedAnyway);

        assert_eq!(verify_chain(&logs), Some(logs[1].id));
    }

    // -- Fire-and-forget -----------------------------------------------------

    #[tokio::test]
    async fn log_decision_persists_in_background() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());

        recorder
            .log_decision(1, "leads", decision(Some(UserAction::CreatedAnyway)))
            .await
            .unwrap();

        let logs = store.list_for_tenant(1, 50, 0).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].user_action, Some(UserAction::CreatedAnyway));
        assert_eq!(logs[0].rule_id, Some(3));
    }

    #[tokio::test]
    async fn log_decision_swallows_write_failures() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let recorder = AuditRecorder::new(store.clone());

        let handle = recorder.log_decision(1, "leads", decision(Some(UserAction::Cancelled)));
        assert!(handle.await.is_ok());

        store.set_unavailable(false);
        assert!(store.list_for_tenant(1, 50, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_maps_store_errors_to_audit_failures() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let recorder = AuditRecorder::new(store.clone());

        let result = recorder
            .record(AuditRecorder::entry(1, "leads", decision(None)))
            .await;
        assert_matches!(result, Err(EngineError::AuditWriteFailure(_)));
    }
}
