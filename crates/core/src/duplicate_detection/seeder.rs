//! Starter rule set for newly provisioned tenants.

use crate::duplicate_detection::store::RuleStore;
use crate::entity_fields::{ENTITY_ACCOUNTS, ENTITY_CONTACTS, ENTITY_LEADS};
use crate::error::EngineError;
use crate::match_rule::{validate_new_rule, MatchLogic, MatchRule, NewMatchRule};
use crate::types::TenantId;

/// Entity types that receive default rules, in seeding order.
pub const SEEDED_ENTITY_TYPES: &[&str] = &[ENTITY_LEADS, ENTITY_CONTACTS, ENTITY_ACCOUNTS];

fn starter(
    entity_type: &str,
    name: &str,
    description: &str,
    fields: &[&str],
    priority: i32,
) -> NewMatchRule {
    NewMatchRule {
        entity_type: entity_type.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        field_groups: vec![fields.iter().map(|f| f.to_string()).collect()],
        match_logic: MatchLogic::Any,
        is_active: Some(true),
        priority,
    }
}

/// The canonical starter rules for `entity_type`, highest priority first.
///
/// Person-like entities match on email, then phone, then full name; accounts
/// match on name, then website. Unknown entity types get no rules.
pub fn default_rules(entity_type: &str) -> Vec<NewMatchRule> {
    match entity_type {
        ENTITY_LEADS | ENTITY_CONTACTS => vec![
            starter(entity_type, "Email match", "Same email address", &["email"], 10),
            starter(entity_type, "Phone match", "Same phone number", &["phone"], 9),
            starter(
                entity_type,
                "Name match",
                "Same first and last name",
                &["first_name", "last_name"],
                5,
            ),
        ],
        ENTITY_ACCOUNTS => vec![
            starter(entity_type, "Account name match", "Same account name", &["name"], 10),
            starter(entity_type, "Website match", "Same website", &["website"], 9),
        ],
        _ => Vec::new(),
    }
}

/// Create the starter rule set for a tenant.
///
/// Entity types that already have any rule are left untouched, so running
/// this twice creates nothing the second time. Returns the created rules.
pub async fn seed_default_rules(
    store: &dyn RuleStore,
    tenant_id: TenantId,
) -> Result<Vec<MatchRule>, EngineError> {
    if tenant_id <= 0 {
        return Err(EngineError::MissingTenantContext);
    }

    let mut created = Vec::new();

    for &entity_type in SEEDED_ENTITY_TYPES {
        let existing = store.list_rules(tenant_id, Some(entity_type)).await?;
        if !existing.is_empty() {
            tracing::info!(
                tenant_id,
                entity_type,
                existing = existing.len(),
                "Match rules already configured, skipping defaults"
            );
            continue;
        }

        for body in default_rules(entity_type) {
            let groups = validate_new_rule(&body)?;
            created.push(store.create_rule(tenant_id, &body, &groups).await?);
        }
    }

    tracing::info!(tenant_id, created = created.len(), "Seeded default match rules");
    Ok(created)
}
