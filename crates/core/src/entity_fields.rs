//! Per-entity field whitelists.
//!
//! Rule administration only accepts field paths listed here. The engine itself
//! never consults this table at evaluation time.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Entity type constants
// ---------------------------------------------------------------------------

pub const ENTITY_LEADS: &str = "leads";
pub const ENTITY_CONTACTS: &str = "contacts";
pub const ENTITY_ACCOUNTS: &str = "accounts";
pub const VALID_ENTITY_TYPES: &[&str] = &[ENTITY_LEADS, ENTITY_CONTACTS, ENTITY_ACCOUNTS];

// ---------------------------------------------------------------------------
// Whitelists
// ---------------------------------------------------------------------------

const ADDRESS_FIELDS: &[&str] = &[
    "address.street",
    "address.city",
    "address.postal_code",
    "address.country",
];

const LEAD_FIELDS: &[&str] = &[
    "email",
    "phone",
    "first_name",
    "last_name",
    "company",
    "industry",
    "website",
    "title",
];

const CONTACT_FIELDS: &[&str] = &[
    "email",
    "phone",
    "mobile",
    "first_name",
    "last_name",
    "account_name",
    "title",
];

const ACCOUNT_FIELDS: &[&str] = &["name", "website", "phone", "email", "industry", "tax_id"];

/// Entity-specific (non-address) fields for `entity_type`, if it is known.
fn entity_fields(entity_type: &str) -> Option<&'static [&'static str]> {
    match entity_type {
        ENTITY_LEADS => Some(LEAD_FIELDS),
        ENTITY_CONTACTS => Some(CONTACT_FIELDS),
        ENTITY_ACCOUNTS => Some(ACCOUNT_FIELDS),
        _ => None,
    }
}

/// Validate that `entity_type` is one of the supported collections.
pub fn validate_entity_type(entity_type: &str) -> Result<(), CoreError> {
    if VALID_ENTITY_TYPES.contains(&entity_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid entity type '{entity_type}'. Must be one of: {}",
            VALID_ENTITY_TYPES.join(", ")
        )))
    }
}

/// Whether `path` may be used in a rule for `entity_type`.
pub fn is_field_allowed(entity_type: &str, path: &str) -> bool {
    entity_fields(entity_type)
        .is_some_and(|fields| fields.contains(&path) || ADDRESS_FIELDS.contains(&path))
}

/// Every whitelisted path for `entity_type` (empty for unknown types).
pub fn allowed_fields(entity_type: &str) -> Vec<&'static str> {
    match entity_fields(entity_type) {
        Some(fields) => fields.iter().chain(ADDRESS_FIELDS).copied().collect(),
        None => Vec::new(),
    }
}
