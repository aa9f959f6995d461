use crate::types::DbId;

/// Domain-level validation and lookup errors (rule administration, decisions).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures raised while running a duplicate check or writing its audit trail.
///
/// Callers decide what to do with these; see
/// [`DuplicateChecker::check_or_fail_open`](crate::duplicate_detection::DuplicateChecker::check_or_fail_open)
/// for the standard fail-open policy.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The record, rule, or audit store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store call exceeded the caller-imposed deadline.
    #[error("Store call '{operation}' timed out after {after_ms} ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// No tenant could be resolved for the request.
    #[error("Missing tenant context")]
    MissingTenantContext,

    /// A rule with unusable field groups.
    #[error("Malformed rule {rule_id}: {reason}")]
    MalformedRule { rule_id: DbId, reason: String },

    /// The match log entry could not be persisted.
    #[error("Audit write failed: {0}")]
    AuditWriteFailure(String),

    /// A domain error surfaced through a store (e.g. a missing rule on update).
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Whether this failure should be absorbed by the fail-open policy.
    pub fn is_fail_open(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_)
                | EngineError::Timeout { .. }
                | EngineError::MissingTenantContext
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_fail_open() {
        assert!(EngineError::StoreUnavailable("down".into()).is_fail_open());
        assert!(EngineError::Timeout {
            operation: "list_all",
            after_ms: 50
        }
        .is_fail_open());
        assert!(EngineError::MissingTenantContext.is_fail_open());
    }

    #[test]
    fn domain_errors_do_not_fail_open() {
        assert!(!EngineError::Core(CoreError::Validation("bad".into())).is_fail_open());
        assert!(!EngineError::AuditWriteFailure("disk".into()).is_fail_open());
    }

    #[test]
    fn timeout_message_names_operation() {
        let err = EngineError::Timeout {
            operation: "query_equal",
            after_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "Store call 'query_equal' timed out after 250 ms"
        );
    }
}
