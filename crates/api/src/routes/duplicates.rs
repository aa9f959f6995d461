//! Route definitions for duplicate checks and decisions.
//!
//! ```text
//! /{entity_type}/duplicates/check           run duplicate check (POST)
//! /{entity_type}/duplicates/decisions       record decision (POST)
//!
//! /duplicates/logs                          match log (GET)
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::duplicates;
use crate::state::AppState;

/// Check and decision routes, nested at `/{entity_type}/duplicates`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/check", post(duplicates::check_duplicates))
        .route("/decisions", post(duplicates::record_decision))
}

/// Match log routes, nested at `/duplicates`.
pub fn log_router() -> Router<AppState> {
    Router::new().route("/logs", get(duplicates::list_logs))
}
