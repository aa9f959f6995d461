//! Repository for the `match_rules` table.

use recordguard_core::match_rule::{FieldGroup, NewMatchRule, UpdateMatchRule};
use recordguard_core::types::{DbId, TenantId};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::match_rule::MatchRuleRow;

/// Column list for `match_rules` queries.
const COLUMNS: &str = "id, tenant_id, entity_type, name, description, field_groups, \
     match_logic, is_active, priority, created_at, updated_at";

/// Engine evaluation order: priority descending, ties by insertion order.
const PRIORITY_ORDER: &str = "ORDER BY priority DESC, id ASC";

/// Provides CRUD operations for match rules.
pub struct MatchRuleRepo;

impl MatchRuleRepo {
    /// Active rules for one entity type, in evaluation order.
    pub async fn list_active_by_priority(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<MatchRuleRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM match_rules \
             WHERE tenant_id = $1 AND entity_type = $2 AND is_active = true \
             {PRIORITY_ORDER}"
        );
        sqlx::query_as::<_, MatchRuleRow>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .fetch_all(pool)
            .await
    }

    /// All rules of a tenant regardless of active state, optionally for one entity type.
    pub async fn list(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: Option<&str>,
    ) -> Result<Vec<MatchRuleRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM match_rules \
             WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR entity_type = $2) \
             {PRIORITY_ORDER}"
        );
        sqlx::query_as::<_, MatchRuleRow>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .fetch_all(pool)
            .await
    }

    /// Find a rule by ID within the tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
    ) -> Result<Option<MatchRuleRow>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM match_rules WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, MatchRuleRow>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a rule. `field_groups` must be the validated form of `input.field_groups`.
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        input: &NewMatchRule,
        field_groups: &[FieldGroup],
    ) -> Result<MatchRuleRow, sqlx::Error> {
        let sql = format!(
            "INSERT INTO match_rules \
                (tenant_id, entity_type, name, description, field_groups, \
                 match_logic, is_active, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, true), $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MatchRuleRow>(&sql)
            .bind(tenant_id)
            .bind(&input.entity_type)
            .bind(&input.name)
            .bind(&input.description)
            .bind(Json(field_groups))
            .bind(input.match_logic.as_str())
            .bind(input.is_active)
            .bind(input.priority)
            .fetch_one(pool)
            .await
    }

    /// Update a rule. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists for the tenant.
    pub async fn update(
        pool: &PgPool,
        tenant_id: TenantId,
        id: DbId,
        input: &UpdateMatchRule,
        field_groups: Option<&[FieldGroup]>,
    ) -> Result<Option<MatchRuleRow>, sqlx::Error> {
        let sql = format!(
            "UPDATE match_rules SET \
                name = COALESCE($3, name), \
                description = COALESCE($4, description), \
                field_groups = COALESCE($5, field_groups), \
                match_logic = COALESCE($6, match_logic), \
                is_active = COALESCE($7, is_active), \
                priority = COALESCE($8, priority), \
                updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MatchRuleRow>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(field_groups.map(Json))
            .bind(input.match_logic.map(|l| l.as_str()))
            .bind(input.is_active)
            .bind(input.priority)
            .fetch_optional(pool)
            .await
    }

    /// Delete a rule. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, tenant_id: TenantId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM match_rules WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of rules the tenant has across all entity types.
    pub async fn count(pool: &PgPool, tenant_id: TenantId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM match_rules WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(pool)
        .await
    }
}
