//! Maps to the `match_rules` table.

use recordguard_core::error::CoreError;
use recordguard_core::match_rule::{FieldGroup, MatchLogic, MatchRule};
use recordguard_core::types::{DbId, TenantId, Timestamp};
use sqlx::FromRow;

/// A row from the `match_rules` table.
///
/// `field_groups` is kept as raw JSON so a hand-edited row cannot fail a
/// whole listing; see the [`TryFrom`] impl.
#[derive(Debug, Clone, FromRow)]
pub struct MatchRuleRow {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub name: String,
    pub description: Option<String>,
    pub field_groups: serde_json::Value,
    pub match_logic: String,
    pub is_active: bool,
    pub priority: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<MatchRuleRow> for MatchRule {
    type Error = CoreError;

    fn try_from(row: MatchRuleRow) -> Result<Self, Self::Error> {
        let match_logic = MatchLogic::from_name(&row.match_logic)?;
        // Unreadable groups leave the rule malformed, which the engine skips.
        let field_groups = serde_json::from_value::<Vec<FieldGroup>>(row.field_groups)
            .unwrap_or_else(|e| {
                tracing::warn!(rule_id = row.id, error = %e, "Unreadable field_groups on match rule");
                Vec::new()
            });

        Ok(MatchRule {
            id: row.id,
            tenant_id: row.tenant_id,
            entity_type: row.entity_type,
            name: row.name,
            description: row.description,
            field_groups,
            match_logic,
            is_active: row.is_active,
            priority: row.priority,
        })
    }
}
