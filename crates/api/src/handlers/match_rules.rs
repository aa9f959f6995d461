//! Handlers for match rule administration.
//!
//! Rules are validated against the entity's field whitelist before they
//! reach the store, so the engine only sees malformed rules when they were
//! written around this API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use recordguard_core::entity_fields::{allowed_fields, validate_entity_type};
use recordguard_core::error::CoreError;
use recordguard_core::match_rule::{
    validate_new_rule, validate_update_rule, MatchRule, NewMatchRule, UpdateMatchRule,
};
use recordguard_core::types::{DbId, TenantId};

use crate::error::AppResult;
use crate::middleware::tenant::TenantContext;
use crate::query::EntityTypeFilter;
use crate::response::DataResponse;
use crate::state::AppState;

const ENTITY: &str = "MatchRule";

async fn find_rule(state: &AppState, tenant_id: TenantId, id: DbId) -> AppResult<MatchRule> {
    state
        .rules
        .get_rule(tenant_id, id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: ENTITY, id }.into())
}

/// GET /api/v1/admin/match-rules
///
/// All of the tenant's rules in evaluation order, optionally for one entity type.
pub async fn list_rules(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<EntityTypeFilter>,
) -> AppResult<impl IntoResponse> {
    let tenant_id = tenant.require()?;
    if let Some(entity_type) = &filter.entity_type {
        validate_entity_type(entity_type)?;
    }
    let rules = state
        .rules
        .list_rules(tenant_id, filter.entity_type.as_deref())
        .await?;
    Ok(Json(DataResponse { data: rules }))
}

/// GET /api/v1/admin/match-rules/fields/{entity_type}
///
/// Field paths a rule for this entity type may reference.
pub async fn list_fields(Path(entity_type): Path<String>) -> AppResult<impl IntoResponse> {
    validate_entity_type(&entity_type)?;
    Ok(Json(DataResponse {
        data: allowed_fields(&entity_type),
    }))
}

/// GET /api/v1/admin/match-rules/{id}
pub async fn get_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let tenant_id = tenant.require()?;
    let rule = find_rule(&state, tenant_id, id).await?;
    Ok(Json(DataResponse { data: rule }))
}

/// POST /api/v1/admin/match-rules
pub async fn create_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(body): Json<NewMatchRule>,
) -> AppResult<impl IntoResponse> {
    let tenant_id = tenant.require()?;
    let field_groups = validate_new_rule(&body)?;

    let rule = state.rules.create_rule(tenant_id, &body, &field_groups).await?;
    tracing::info!(
        tenant_id,
        rule_id = rule.id,
        entity_type = %rule.entity_type,
        priority = rule.priority,
        "Match rule created"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: rule })))
}

/// PUT /api/v1/admin/match-rules/{id}
///
/// Partial update; omitted fields keep their values.
pub async fn update_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<DbId>,
    Json(body): Json<UpdateMatchRule>,
) -> AppResult<impl IntoResponse> {
    let tenant_id = tenant.require()?;
    let existing = find_rule(&state, tenant_id, id).await?;
    let field_groups = validate_update_rule(&existing.entity_type, &body)?;

    let rule = state
        .rules
        .update_rule(tenant_id, id, &body, field_groups.as_deref())
        .await?
        .ok_or(CoreError::NotFound { entity: ENTITY, id })?;
    tracing::info!(tenant_id, rule_id = id, "Match rule updated");
    Ok(Json(DataResponse { data: rule }))
}

/// DELETE /api/v1/admin/match-rules/{id}
pub async fn delete_rule(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let tenant_id = tenant.require()?;
    if !state.rules.delete_rule(tenant_id, id).await? {
        return Err(CoreError::NotFound { entity: ENTITY, id }.into());
    }
    tracing::info!(tenant_id, rule_id = id, "Match rule deleted");
    Ok(StatusCode::NO_CONTENT)
}
