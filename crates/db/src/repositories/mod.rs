//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Every query is tenant-scoped.

pub mod match_log_repo;
pub mod match_rule_repo;
pub mod record_repo;

pub use match_log_repo::MatchLogRepo;
pub use match_rule_repo::MatchRuleRepo;
pub use record_repo::RecordRepo;
