//! Rule-based duplicate detection for records about to be created.
//!
//! The check is an advisory pre-commit gate: active rules for the tenant and
//! entity type are evaluated in descending priority and the first rule that
//! produces any match decides the result. Nothing here holds state; all data
//! lives behind the store traits in [`store`].
//!
//! - [`evaluator`]: per-rule ANY / ALL field-group evaluation.
//! - [`reporter`]: the full field-overlap view shown to the reviewer.
//! - [`checker`]: priority-ordered orchestration and the fail-open policy.
//! - [`seeder`]: starter rules for newly provisioned tenants.
//! - [`recorder`]: append-only decision log.

pub mod checker;
pub mod evaluator;
pub mod recorder;
pub mod reporter;
pub mod seeder;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, FieldMap};

pub use checker::{CheckerConfig, DuplicateChecker};
pub use evaluator::{FieldGroupEvaluator, RuleEvaluator};
pub use recorder::{AuditRecorder, Decision, DecisionOutcome, MatchLog, NewMatchLog, UserAction};
pub use reporter::find_matched_fields;
pub use seeder::{default_rules, seed_default_rules};
pub use store::{AuditSink, RecordStore, RuleStore};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Confidence reported for every match. Only exact matching exists.
pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One existing record that looks like a duplicate of the candidate.
///
/// Ephemeral: never persisted directly. A [`MatchLog`] is written only once a
/// human acts on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// The would-be new record; `None` when it has not been saved yet.
    pub candidate_record_id: Option<DbId>,
    pub matched_record_id: DbId,
    /// Full attributes of the existing record, for display.
    pub matched_record_snapshot: FieldMap,
    /// Field path -> candidate value for every overlapping field.
    pub matched_fields: FieldMap,
    pub confidence_score: f64,
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub has_duplicates: bool,
    pub matches: Vec<DuplicateMatch>,
    /// The rule whose matches are reported, if any rule matched.
    pub deciding_rule_id: Option<DbId>,
}

impl EvaluationResult {
    /// The "no duplicates" result.
    pub fn none() -> Self {
        Self::default()
    }

    /// Result decided by `rule_id`. An empty match list yields [`Self::none`].
    pub fn decided_by(rule_id: DbId, matches: Vec<DuplicateMatch>) -> Self {
        if matches.is_empty() {
            return Self::none();
        }
        Self {
            has_duplicates: true,
            matches,
            deciding_rule_id: Some(rule_id),
        }
    }
}
