//! Repository for the `records` table.
//!
//! Only what duplicate detection needs: insertion for seeding data and
//! the two read paths the evaluator uses.

use recordguard_core::record::FieldPath;
use recordguard_core::types::{FieldMap, TenantId};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::record::RecordRow;

/// Column list for `records` queries.
const COLUMNS: &str = "id, tenant_id, entity_type, attributes, created_at";

/// Provides access to entity records.
pub struct RecordRepo;

impl RecordRepo {
    /// Insert a record with the given attributes.
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: &str,
        attributes: &FieldMap,
    ) -> Result<RecordRow, sqlx::Error> {
        let sql = format!(
            "INSERT INTO records (tenant_id, entity_type, attributes) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RecordRow>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .bind(Json(attributes))
            .fetch_one(pool)
            .await
    }

    /// All records of one entity collection, oldest first.
    pub async fn list_all(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<RecordRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM records \
             WHERE tenant_id = $1 AND entity_type = $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, RecordRow>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .fetch_all(pool)
            .await
    }

    /// Records whose attribute at each path equals the given JSON value exactly.
    ///
    /// Comparison is JSONB equality on the raw values, so `"Acme"` and
    /// `"acme"` differ. The filters are folded into one `@>` document so the
    /// GIN index on `attributes` narrows the rows; the per-path equality
    /// clauses then reject containment-only hits such as array supersets.
    pub async fn query_equal(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: &str,
        filters: &[(FieldPath, Value)],
    ) -> Result<Vec<RecordRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM records \
             WHERE tenant_id = $1 AND entity_type = $2 \
             AND attributes @> $3::JSONB{} \
             ORDER BY id",
            equality_clause(filters.len(), 4)
        );

        let mut query = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .bind(Json(containment_document(filters)));
        for (path, value) in filters {
            let segments: Vec<String> = path.segments().map(str::to_string).collect();
            query = query.bind(segments).bind(Json(value));
        }
        query.fetch_all(pool).await
    }
}

/// Nest every `(path, value)` pair into one object, e.g. `address.city = "Lyon"`
/// and `company = "Acme"` become `{"address": {"city": "Lyon"}, "company": "Acme"}`.
///
/// A path running through a non-object value replaces it; such filters can
/// never all hold and the equality clauses return no rows.
fn containment_document(filters: &[(FieldPath, Value)]) -> Value {
    let mut root = Map::new();
    for (path, value) in filters {
        let segments: Vec<&str> = path.segments().collect();
        insert_at_path(&mut root, &segments, value.clone());
    }
    Value::Object(root)
}

fn insert_at_path(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            node.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_at_path(map, rest, value);
            }
        }
    }
}

/// ` AND attributes #> $n::TEXT[] = $m::JSONB` once per filter, numbering
/// placeholders from `first_param`.
fn equality_clause(filter_count: usize, first_param: usize) -> String {
    (0..filter_count)
        .map(|i| {
            let path_param = first_param + i * 2;
            let value_param = path_param + 1;
            format!(" AND attributes #> ${path_param}::TEXT[] = ${value_param}::JSONB")
        })
        .collect()
}
