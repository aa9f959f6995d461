//! Domain logic for record duplicate detection.
//!
//! Pure types and rule evaluation with no database or HTTP dependencies.
//! Storage is reached only through the traits in
//! [`duplicate_detection::store`]; [`memory::MemoryStore`] implements them
//! in process.

pub mod duplicate_detection;
pub mod entity_fields;
pub mod error;
pub mod match_rule;
pub mod memory;
pub mod normalize;
pub mod record;
pub mod types;
