use std::sync::Arc;

use recordguard_core::duplicate_detection::{
    AuditRecorder, AuditSink, DuplicateChecker, RecordStore, RuleStore,
};
use recordguard_db::DbPool;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Rule administration and seeding.
    pub rules: Arc<dyn RuleStore>,
    /// Match log reads.
    pub audit: Arc<dyn AuditSink>,
    /// Duplicate check engine.
    pub checker: DuplicateChecker,
    /// Fire-and-forget decision logging.
    pub recorder: AuditRecorder,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Database pool for health reporting; `None` when running on in-memory stores.
    pub pool: Option<DbPool>,
}

impl AppState {
    /// Wire every component to one store implementing all three store traits.
    pub fn from_store<S>(store: Arc<S>, config: ServerConfig, pool: Option<DbPool>) -> Self
    where
        S: RecordStore + RuleStore + AuditSink + 'static,
    {
        let records: Arc<dyn RecordStore> = store.clone();
        let rules: Arc<dyn RuleStore> = store.clone();
        let audit: Arc<dyn AuditSink> = store;

        Self {
            checker: DuplicateChecker::new(records, rules.clone(), config.checker_config()),
            recorder: AuditRecorder::new(audit.clone()),
            rules,
            audit,
            config: Arc::new(config),
            pool,
        }
    }
}
