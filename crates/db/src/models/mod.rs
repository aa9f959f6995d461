//! Row types for the `records`, `match_rules`, and `match_logs` tables.

pub mod match_log;
pub mod match_rule;
pub mod record;
