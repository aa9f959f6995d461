//! Handlers for tenant provisioning.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use recordguard_core::duplicate_detection::seed_default_rules;
use recordguard_core::match_rule::MatchRule;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::tenant::TenantContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// Result of seeding: the rules created now and the tenant's total afterwards.
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub created: Vec<MatchRule>,
    pub total_rules: i64,
}

/// POST /api/v1/tenants/seed-default-rules
///
/// Install the starter rules. Entity types that already have rules are
/// skipped, so repeating the call is harmless.
pub async fn seed_rules(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> AppResult<impl IntoResponse> {
    let tenant_id = tenant.require()?;
    let created = seed_default_rules(state.rules.as_ref(), tenant_id).await?;
    let total_rules = state.rules.count_rules(tenant_id).await?;
    Ok(Json(DataResponse {
        data: SeedResponse {
            created,
            total_rules,
        },
    }))
}
