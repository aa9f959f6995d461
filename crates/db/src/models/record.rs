//! Maps to the `records` table.

use recordguard_core::record::Record;
use recordguard_core::types::{DbId, FieldMap, TenantId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `records` table. `attributes` holds the record's fields.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub attributes: Json<FieldMap>,
    pub created_at: Timestamp,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record::new(row.id, row.attributes.0)
    }
}
