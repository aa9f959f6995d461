//! Maps to the append-only `match_logs` table.

use recordguard_core::duplicate_detection::{MatchLog, UserAction};
use recordguard_core::error::CoreError;
use recordguard_core::types::{DbId, FieldMap, TenantId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `match_logs` table. There is no `updated_at`.
#[derive(Debug, Clone, FromRow)]
pub struct MatchLogRow {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub candidate_record_id: Option<DbId>,
    pub matched_record_id: DbId,
    pub matched_fields: Json<FieldMap>,
    pub rule_id: Option<DbId>,
    pub confidence_score: f64,
    pub user_id: Option<DbId>,
    pub user_action: Option<String>,
    pub actioned_at: Option<Timestamp>,
    pub integrity_hash: String,
    pub created_at: Timestamp,
}

impl TryFrom<MatchLogRow> for MatchLog {
    type Error = CoreError;

    fn try_from(row: MatchLogRow) -> Result<Self, Self::Error> {
        let user_action = row
            .user_action
            .as_deref()
            .map(UserAction::from_name)
            .transpose()?;

        Ok(MatchLog {
            id: row.id,
            tenant_id: row.tenant_id,
            entity_type: row.entity_type,
            candidate_record_id: row.candidate_record_id,
            matched_record_id: row.matched_record_id,
            matched_fields: row.matched_fields.0,
            rule_id: row.rule_id,
            confidence_score: row.confidence_score,
            user_id: row.user_id,
            user_action,
            actioned_at: row.actioned_at,
            integrity_hash: row.integrity_hash,
            created_at: row.created_at,
        })
    }
}
