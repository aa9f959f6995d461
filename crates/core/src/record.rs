//! Opaque record shapes and dot-notation field access.
//!
//! Records are untyped attribute maps; the engine never assumes an entity
//! schema beyond the per-entity whitelists in [`crate::entity_fields`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{DbId, FieldMap};

/// Maximum length of a field path.
pub const MAX_FIELD_PATH_LEN: usize = 128;

static FIELD_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("field path regex is valid")
});

// ---------------------------------------------------------------------------
// FieldPath
// ---------------------------------------------------------------------------

/// A dot-separated attribute path such as `"email"` or `"address.city"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    /// Parse and validate a field path.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.len() > MAX_FIELD_PATH_LEN {
            return Err(CoreError::Validation(format!(
                "Field path exceeds {MAX_FIELD_PATH_LEN} characters"
            )));
        }
        if !FIELD_PATH_RE.is_match(raw) {
            return Err(CoreError::Validation(format!(
                "Invalid field path '{raw}'. Use dot-separated identifiers, e.g. 'address.city'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, e.g. `["address", "city"]`.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldPath {
    /// Unchecked conversion for trusted literals (seed data, tests).
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Resolve a dot-notation path inside a field map.
///
/// Returns `None` when any segment is missing or an intermediate value is not
/// an object.
pub fn lookup_path<'a>(fields: &'a FieldMap, path: &FieldPath) -> Option<&'a Value> {
    let mut segments = path.segments();
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An existing record returned by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: DbId,
    pub fields: FieldMap,
}

impl Record {
    pub fn new(id: DbId, fields: FieldMap) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        lookup_path(&self.fields, path)
    }
}

/// A record about to be created. It may not have an id yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub id: Option<DbId>,
    pub fields: FieldMap,
}

impl CandidateRecord {
    pub fn new(fields: FieldMap) -> Self {
        Self { id: None, fields }
    }

    pub fn with_id(mut self, id: DbId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        lookup_path(&self.fields, path)
    }
}
