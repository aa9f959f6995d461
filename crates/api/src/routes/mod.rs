pub mod duplicates;
pub mod health;
pub mod match_rules;
pub mod tenants;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /{entity_type}/duplicates/check                  run duplicate check (POST)
/// /{entity_type}/duplicates/decisions              record reviewer decision (POST)
/// /duplicates/logs                                 tenant match log (GET)
///
/// /admin/match-rules                               list, create (GET, POST)
/// /admin/match-rules/fields/{entity_type}          matchable fields (GET)
/// /admin/match-rules/{id}                          get, update, delete
///
/// /tenants/seed-default-rules                      install starter rules (POST)
/// ```
///
/// Every route is tenant-scoped through the `x-tenant-id` header.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/{entity_type}/duplicates", duplicates::router())
        .nest("/duplicates", duplicates::log_router())
        .nest("/admin/match-rules", match_rules::router())
        .nest("/tenants", tenants::router())
}
