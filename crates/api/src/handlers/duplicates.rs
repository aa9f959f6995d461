//! Handlers for the duplicate check, decision logging, and match log.
//!
//! The check is advisory: it never fails because of missing tenant context
//! or an unavailable store. Decision logging is fire-and-forget; the
//! response only tells the caller what to do next.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use recordguard_core::duplicate_detection::{Decision, DecisionOutcome, UserAction};
use recordguard_core::entity_fields::validate_entity_type;
use recordguard_core::error::CoreError;
use recordguard_core::record::CandidateRecord;
use recordguard_core::types::{DbId, FieldMap};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::tenant::TenantContext;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of a duplicate check.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Id of the candidate when it is already saved (edit flows).
    #[serde(default)]
    pub candidate_id: Option<DbId>,
    #[serde(default)]
    pub fields: FieldMap,
}

/// Body of a reviewer decision on a reported match.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub candidate_id: Option<DbId>,
    pub matched_record_id: DbId,
    #[serde(default)]
    pub matched_fields: FieldMap,
    pub rule_id: Option<DbId>,
    pub confidence_score: Option<f64>,
    /// `None` records a pending decision.
    pub user_action: Option<UserAction>,
}

// ---------------------------------------------------------------------------
// Duplicate check
// ---------------------------------------------------------------------------

/// POST /api/v1/{entity_type}/duplicates/check
///
/// Run the duplicate check for a record about to be created. Always returns
/// 200 for a known entity type; infrastructure failures read as "no duplicates".
pub async fn check_duplicates(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(entity_type): Path<String>,
    Json(body): Json<CheckRequest>,
) -> AppResult<impl IntoResponse> {
    validate_entity_type(&entity_type)?;

    let mut candidate = CandidateRecord::new(body.fields);
    if let Some(id) = body.candidate_id {
        candidate = candidate.with_id(id);
    }

    let result = state
        .checker
        .check_or_fail_open(tenant.tenant_id, &entity_type, &candidate)
        .await;
    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// POST /api/v1/{entity_type}/duplicates/decisions
///
/// Record the reviewer's choice and return what the UI should do. The log
/// write happens in the background and cannot fail this request.
pub async fn record_decision(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(entity_type): Path<String>,
    Json(body): Json<DecisionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_entity_type(&entity_type)?;
    if let Some(score) = body.confidence_score {
        if !(0.0..=1.0).contains(&score) {
            return Err(CoreError::Validation(format!(
                "Invalid confidence_score {score}. Must be between 0 and 1"
            ))
            .into());
        }
    }

    let outcome = DecisionOutcome::for_action(body.user_action, body.matched_record_id);

    match tenant.tenant_id {
        Some(tenant_id) => {
            let decision = Decision {
                candidate_record_id: body.candidate_id,
                matched_record_id: body.matched_record_id,
                matched_fields: body.matched_fields,
                rule_id: body.rule_id,
                confidence_score: body.confidence_score,
                user_id: tenant.user_id,
                user_action: body.user_action,
            };
            // Detached; failures are logged by the recorder.
            drop(state.recorder.log_decision(tenant_id, &entity_type, decision));
        }
        None => tracing::warn!(
            entity_type = entity_type.as_str(),
            matched_record_id = body.matched_record_id,
            "Decision not logged: no tenant context"
        ),
    }

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: outcome })))
}

// ---------------------------------------------------------------------------
// Match log
// ---------------------------------------------------------------------------

/// GET /api/v1/duplicates/logs
///
/// Newest-first page of the tenant's match log.
pub async fn list_logs(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let tenant_id = tenant.require()?;
    let logs = state
        .audit
        .list_for_tenant(tenant_id, params.limit(), params.offset())
        .await?;
    Ok(Json(DataResponse { data: logs }))
}
