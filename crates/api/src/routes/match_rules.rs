//! Route definitions for match rule administration.
//!
//! ```text
//! /admin/match-rules                        list, create (GET, POST)
//! /admin/match-rules/fields/{entity_type}   matchable fields (GET)
//! /admin/match-rules/{id}                   get, update, delete (GET, PUT, DELETE)
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::match_rules;
use crate::state::AppState;

/// Rule administration routes, nested at `/admin/match-rules`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(match_rules::list_rules).post(match_rules::create_rule),
        )
        .route("/fields/{entity_type}", get(match_rules::list_fields))
        .route(
            "/{id}",
            get(match_rules::get_rule)
                .put(match_rules::update_rule)
                .delete(match_rules::delete_rule),
        )
}
