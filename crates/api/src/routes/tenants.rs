//! Route definitions for tenant provisioning.
//!
//! ```text
//! /tenants/seed-default-rules               install starter rules (POST)
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::tenants;
use crate::state::AppState;

/// Tenant routes, nested at `/tenants`.
pub fn router() -> Router<AppState> {
    Router::new().route("/seed-default-rules", post(tenants::seed_rules))
}
