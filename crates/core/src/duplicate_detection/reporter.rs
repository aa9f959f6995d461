//! Match transparency view.
//!
//! Regardless of which groups decided a match, the reviewer sees every field
//! of the deciding rule on which the two records agree.

use crate::match_rule::FieldGroup;
use crate::normalize::{is_truthy, normalized_eq};
use crate::record::{lookup_path, CandidateRecord, Record};
use crate::types::FieldMap;

/// Collect every overlapping field across every group of the deciding rule.
///
/// A path is included when the candidate's raw value is truthy and equals the
/// existing record's value after normalization. The value reported is the
/// candidate's raw value. Paths shared by several groups appear once.
pub fn find_matched_fields(
    existing: &Record,
    candidate: &CandidateRecord,
    field_groups: &[FieldGroup],
) -> FieldMap {
    let mut matched = FieldMap::new();

    for path in field_groups.iter().flat_map(FieldGroup::fields) {
        if matched.contains_key(path.as_str()) {
            continue;
        }
        let Some(candidate_value) = candidate.get(path) else {
            continue;
        };
        if !is_truthy(candidate_value) {
            continue;
        }
        let overlaps = lookup_path(&existing.fields, path)
            .is_some_and(|existing_value| normalized_eq(existing_value, candidate_value));
        if overlaps {
            matched.insert(path.to_string(), candidate_value.clone());
        }
    }

    matched
}
