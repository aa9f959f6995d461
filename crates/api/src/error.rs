use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recordguard_core::error::{CoreError, EngineError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`EngineError`] for store and
/// engine failures. Implements [`IntoResponse`] to produce consistent JSON
/// error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `recordguard_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A store or engine failure. Domain errors carried by the engine are
    /// unwrapped into [`AppError::Core`] on conversion.
    #[error(transparent)]
    Engine(EngineError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(core) => AppError::Core(core),
            other => AppError::Engine(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Engine(engine) => classify_engine_error(engine),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Classify an engine error into an HTTP status, error code, and message.
///
/// - Unreachable stores map to 503 and timeouts to 504, with sanitized messages.
/// - A missing tenant maps to 400.
/// - Everything else maps to 500.
fn classify_engine_error(err: &EngineError) -> (StatusCode, &'static str, String) {
    match err {
        EngineError::Core(core) => classify_core_error(core),
        EngineError::StoreUnavailable(detail) => {
            tracing::error!(error = %detail, "Store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "The data store is temporarily unavailable".to_string(),
            )
        }
        EngineError::Timeout { operation, after_ms } => {
            tracing::warn!(operation, after_ms, "Store call timed out");
            (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "The data store did not respond in time".to_string(),
            )
        }
        EngineError::MissingTenantContext => (
            StatusCode::BAD_REQUEST,
            "MISSING_TENANT",
            "Missing or invalid x-tenant-id header".to_string(),
        ),
        EngineError::MalformedRule { .. } | EngineError::AuditWriteFailure(_) => {
            tracing::error!(error = %err, "Engine error");
            internal()
        }
    }
}
