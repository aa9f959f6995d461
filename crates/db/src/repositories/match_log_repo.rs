//! Repository for the append-only `match_logs` table.

use recordguard_core::duplicate_detection::recorder::compute_integrity_hash;
use recordguard_core::duplicate_detection::NewMatchLog;
use recordguard_core::types::TenantId;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use crate::models::match_log::MatchLogRow;

/// Column list for `match_logs` SELECT queries.
const COLUMNS: &str = "\
    id, tenant_id, entity_type, candidate_record_id, matched_record_id, \
    matched_fields, rule_id, confidence_score, user_id, user_action, \
    actioned_at, integrity_hash, created_at";

/// Column list for INSERT (excludes auto-generated `id`, `created_at`).
const INSERT_COLUMNS: &str = "\
    tenant_id, entity_type, candidate_record_id, matched_record_id, \
    matched_fields, rule_id, confidence_score, user_id, user_action, \
    actioned_at, integrity_hash";

/// Insert and query operations for match logs. There is no update or delete.
pub struct MatchLogRepo;

impl MatchLogRepo {
    /// Append one entry, chaining its integrity hash onto the tenant's last entry.
    ///
    /// A transaction-scoped advisory lock on the tenant id serializes
    /// concurrent appends so the chain never forks.
    pub async fn append(pool: &PgPool, entry: &NewMatchLog) -> Result<MatchLogRow, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(entry.tenant_id)
            .execute(&mut *tx)
            .await?;

        let prev_hash = Self::find_last_hash(&mut *tx, entry.tenant_id).await?;
        let integrity_hash = compute_integrity_hash(prev_hash.as_deref(), entry);

        let sql = format!(
            "INSERT INTO match_logs ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, MatchLogRow>(&sql)
            .bind(entry.tenant_id)
            .bind(&entry.entity_type)
            .bind(entry.candidate_record_id)
            .bind(entry.matched_record_id)
            .bind(Json(&entry.matched_fields))
            .bind(entry.rule_id)
            .bind(entry.confidence_score)
            .bind(entry.user_id)
            .bind(entry.user_action.map(|a| a.as_str()))
            .bind(entry.actioned_at)
            .bind(&integrity_hash)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Integrity hash of the tenant's most recent entry.
    pub async fn find_last_hash<'e, E>(
        executor: E,
        tenant_id: TenantId,
    ) -> Result<Option<String>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, String>(
            "SELECT integrity_hash FROM match_logs \
             WHERE tenant_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    /// Newest-first page of a tenant's entries.
    pub async fn list_for_tenant(
        pool: &PgPool,
        tenant_id: TenantId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MatchLogRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM match_logs \
             WHERE tenant_id = $1 \
             ORDER BY id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, MatchLogRow>(&sql)
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// A tenant's whole chain in insertion order, for verification.
    pub async fn list_chain(
        pool: &PgPool,
        tenant_id: TenantId,
    ) -> Result<Vec<MatchLogRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM match_logs WHERE tenant_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, MatchLogRow>(&sql)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
