/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Tenants are keyed by the same BIGSERIAL ids as every other table.
pub type TenantId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Record attributes: an insertion-ordered JSON object.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;
