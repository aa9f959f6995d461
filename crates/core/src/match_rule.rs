//! Match rule model, DTOs, and validation.
//!
//! Rules are owned by tenant administrators; the engine only reads them. A
//! rule is a priority-ordered list of field groups combined with either ANY
//! or ALL semantics.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entity_fields::{is_field_allowed, validate_entity_type};
use crate::error::{CoreError, EngineError};
use crate::record::FieldPath;
use crate::types::{DbId, TenantId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_PRIORITY: i32 = -1000;
pub const MAX_PRIORITY: i32 = 1000;

// ---------------------------------------------------------------------------
// MatchLogic
// ---------------------------------------------------------------------------

/// How a rule's field groups combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchLogic {
    /// A record matches if it satisfies at least one field group entirely.
    Any,
    /// A record matches only if it agrees on every populated field of every group.
    All,
}

impl MatchLogic {
    /// Database / wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }

    /// Parse from the database `match_logic` column (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            other => Err(CoreError::Validation(format!(
                "Unknown match logic '{other}'. Must be one of: any, all"
            ))),
        }
    }
}

impl fmt::Display for MatchLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FieldGroup
// ---------------------------------------------------------------------------

/// A set of field paths that must all be populated and equal to match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldGroup(pub Vec<FieldPath>);

impl FieldGroup {
    pub fn fields(&self) -> &[FieldPath] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[&str; N]> for FieldGroup {
    fn from(paths: [&str; N]) -> Self {
        Self(paths.into_iter().map(FieldPath::from).collect())
    }
}

// ---------------------------------------------------------------------------
// MatchRule
// ---------------------------------------------------------------------------

/// A tenant-scoped duplicate matching rule for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub name: String,
    pub description: Option<String>,
    pub field_groups: Vec<FieldGroup>,
    pub match_logic: MatchLogic,
    pub is_active: bool,
    pub priority: i32,
}

impl MatchRule {
    /// Why this rule cannot be evaluated, if it cannot.
    pub fn malformed_reason(&self) -> Option<String> {
        if self.field_groups.is_empty() {
            return Some("rule has no field groups".to_string());
        }
        self.field_groups
            .iter()
            .position(FieldGroup::is_empty)
            .map(|idx| format!("field group {idx} has no fields"))
    }

    pub fn is_well_formed(&self) -> bool {
        self.malformed_reason().is_none()
    }

    /// [`Self::malformed_reason`] as an [`EngineError::MalformedRule`].
    pub fn ensure_well_formed(&self) -> Result<(), EngineError> {
        match self.malformed_reason() {
            Some(reason) => Err(EngineError::MalformedRule {
                rule_id: self.id,
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Every field path across every group, in declaration order, deduplicated.
    pub fn all_field_paths(&self) -> Vec<&FieldPath> {
        let mut seen = HashSet::new();
        self.field_groups
            .iter()
            .flat_map(|g| g.fields())
            .filter(|p| seen.insert(*p))
            .collect()
    }
}

/// Evaluation order: descending priority, then ascending id (insertion order).
pub fn priority_order(a: &MatchRule, b: &MatchRule) -> Ordering {
    b.priority.cmp(&a.priority).then(a.id.cmp(&b.id))
}

/// Sort rules into evaluation order in place.
pub fn sort_by_priority(rules: &mut [MatchRule]) {
    rules.sort_by(priority_order);
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a new match rule.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NewMatchRule {
    pub entity_type: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub field_groups: Vec<Vec<String>>,
    pub match_logic: MatchLogic,
    pub is_active: Option<bool>,
    #[validate(range(min = -1000, max = 1000))]
    pub priority: i32,
}

/// DTO for patching an existing match rule. `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UpdateMatchRule {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub field_groups: Option<Vec<Vec<String>>>,
    pub match_logic: Option<MatchLogic>,
    pub is_active: Option<bool>,
    #[validate(range(min = -1000, max = 1000))]
    pub priority: Option<i32>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate and parse raw field groups for `entity_type`.
///
/// Each group must be non-empty, contain no repeated path, and use only
/// whitelisted paths.
pub fn parse_field_groups(
    entity_type: &str,
    groups: &[Vec<String>],
) -> Result<Vec<FieldGroup>, CoreError> {
    if groups.is_empty() {
        return Err(CoreError::Validation(
            "A rule needs at least one field group".into(),
        ));
    }

    groups
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            if raw.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Field group {idx} must contain at least one field"
                )));
            }
            let mut seen = HashSet::new();
            let mut paths = Vec::with_capacity(raw.len());
            for field in raw {
                let path = FieldPath::parse(field)?;
                if !is_field_allowed(entity_type, path.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "Field '{path}' is not matchable for entity type '{entity_type}'"
                    )));
                }
                if !seen.insert(path.clone()) {
                    return Err(CoreError::Validation(format!(
                        "Field '{path}' appears twice in field group {idx}"
                    )));
                }
                paths.push(path);
            }
            Ok(FieldGroup(paths))
        })
        .collect()
}

/// Validate a create DTO, returning the parsed field groups on success.
pub fn validate_new_rule(body: &NewMatchRule) -> Result<Vec<FieldGroup>, CoreError> {
    body.validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    validate_entity_type(&body.entity_type)?;
    parse_field_groups(&body.entity_type, &body.field_groups)
}

/// Validate a patch DTO against the rule's entity type.
///
/// Returns the parsed field groups when the patch replaces them.
pub fn validate_update_rule(
    entity_type: &str,
    body: &UpdateMatchRule,
) -> Result<Option<Vec<FieldGroup>>, CoreError> {
    body.validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    body.field_groups
        .as_deref()
        .map(|groups| parse_field_groups(entity_type, groups))
        .transpose()
}

/// Apply a validated patch to a rule.
pub fn apply_update(
    rule: &mut MatchRule,
    body: &UpdateMatchRule,
    field_groups: Option<Vec<FieldGroup>>,
) {
    if let Some(name) = &body.name {
        rule.name = name.clone();
    }
    if body.description.is_some() {
        rule.description = body.description.clone();
    }
    if let Some(groups) = field_groups {
        rule.field_groups = groups;
    }
    if let Some(logic) = body.match_logic {
        rule.match_logic = logic;
    }
    if let Some(active) = body.is_active {
        rule.is_active = active;
    }
    if let Some(priority) = body.priority {
        rule.priority = priority;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: DbId, priority: i32, groups: Vec<FieldGroup>) -> MatchRule {
        MatchRule {
            id,
            tenant_id: 1,
            entity_type: "leads".into(),
            name: format!("rule {id}"),
            description: None,
            field_groups: groups,
            match_logic: MatchLogic::Any,
            is_active: true,
            priority,
        }
    }

    fn new_rule(groups: Vec<Vec<&str>>) -> NewMatchRule {
        NewMatchRule {
            entity_type: "leads".into(),
            name: "Email".into(),
            description: None,
            field_groups: groups
                .into_iter()
                .map(|g| g.into_iter().map(String::from).collect())
                .collect(),
            match_logic: MatchLogic::Any,
            is_active: None,
            priority: 10,
        }
    }

    // -- MatchLogic ----------------------------------------------------------

    #[test]
    fn match_logic_parses_case_insensitively() {
        assert_eq!(MatchLogic::from_name("ANY").unwrap(), MatchLogic::Any);
        assert_eq!(MatchLogic::from_name("all").unwrap(), MatchLogic::All);
        assert!(MatchLogic::from_name("some").is_err());
    }

    #[test]
    fn match_logic_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MatchLogic::All).unwrap(), "\"all\"");
    }

    // -- Well-formedness -----------------------------------------------------

    #[test]
    fn empty_groups_are_malformed() {
        assert!(!rule(1, 0, vec![]).is_well_formed());
        assert!(!rule(1, 0, vec![["email"].into(), FieldGroup::default()]).is_well_formed());
        assert!(rule(1, 0, vec![["email"].into()]).is_well_formed());
    }

    #[test]
    fn ensure_well_formed_names_the_rule() {
        let err = rule(4, 0, vec![]).ensure_well_formed().unwrap_err();
        assert!(matches!(err, EngineError::MalformedRule { rule_id: 4, .. }));
    }

    #[test]
    fn all_field_paths_deduplicates_across_groups() {
        let r = rule(1, 0, vec![["email", "phone"].into(), ["phone"].into()]);
        let paths: Vec<&str> = r.all_field_paths().iter().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["email", "phone"]);
    }

    // -- Ordering ------------------------------------------------------------

    #[test]
    fn sort_orders_by_priority_then_id() {
        let mut rules = vec![
            rule(3, 5, vec![]),
            rule(2, 10, vec![]),
            rule(1, 5, vec![]),
            rule(4, 9, vec![]),
        ];
        sort_by_priority(&mut rules);
        let ids: Vec<DbId> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    // -- Validation ----------------------------------------------------------

    #[test]
    fn valid_rule_passes() {
        let groups = validate_new_rule(&new_rule(vec![vec!["first_name", "last_name"]])).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].fields().len(), 2);
    }

    #[test]
    fn rule_without_groups_rejected() {
        assert!(validate_new_rule(&new_rule(vec![])).is_err());
        assert!(validate_new_rule(&new_rule(vec![vec![]])).is_err());
    }

    #[test]
    fn non_whitelisted_field_rejected() {
        assert!(validate_new_rule(&new_rule(vec![vec!["tax_id"]])).is_err());
    }

    #[test]
    fn repeated_field_in_group_rejected() {
        assert!(validate_new_rule(&new_rule(vec![vec!["email", "email"]])).is_err());
    }

    #[test]
    fn blank_name_and_out_of_range_priority_rejected() {
        let mut body = new_rule(vec![vec!["email"]]);
        body.name = String::new();
        assert!(validate_new_rule(&body).is_err());

        let mut body = new_rule(vec![vec!["email"]]);
        body.priority = MAX_PRIORITY + 1;
        assert!(validate_new_rule(&body).is_err());
    }

    #[test]
    fn unknown_entity_type_rejected() {
        let mut body = new_rule(vec![vec!["email"]]);
        body.entity_type = "deals".into();
        assert!(validate_new_rule(&body).is_err());
    }

    #[test]
    fn apply_update_only_touches_provided_fields() {
        let mut r = rule(1, 5, vec![["email"].into()]);
        let patch = UpdateMatchRule {
            priority: Some(7),
            is_active: Some(false),
            ..Default::default()
        };
        let groups = validate_update_rule("leads", &patch).unwrap();
        apply_update(&mut r, &patch, groups);
        assert_eq!(r.priority, 7);
        assert!(!r.is_active);
        assert_eq!(r.name, "rule 1");
        assert_eq!(r.field_groups, vec![FieldGroup::from(["email"])]);
    }
}
