//! Tenant context extractor.
//!
//! Every call is scoped to a tenant carried in the `x-tenant-id` header. The
//! extractor never rejects: a missing or unparsable tenant yields `None`, so
//! the duplicate check can fail open while stricter handlers call
//! [`TenantContext::require`].

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use recordguard_core::error::EngineError;
use recordguard_core::types::{DbId, TenantId};

use crate::error::AppError;

/// Header carrying the tenant id (positive integer).
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Header carrying the acting user's id.
pub const USER_HEADER: &str = "x-user-id";

/// Tenant and user resolved from request headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<DbId>,
}

impl TenantContext {
    /// The tenant, or [`EngineError::MissingTenantContext`].
    pub fn require(&self) -> Result<TenantId, AppError> {
        self.tenant_id
            .ok_or(AppError::Engine(EngineError::MissingTenantContext))
    }

    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            tenant_id: positive_id(headers, TENANT_HEADER),
            user_id: positive_id(headers, USER_HEADER),
        }
    }
}

fn positive_id(headers: &HeaderMap, name: &'static str) -> Option<DbId> {
    let raw = headers.get(name)?;
    let parsed = raw
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<DbId>().ok())
        .filter(|id| *id > 0);
    if parsed.is_none() {
        tracing::warn!(header = name, "Ignoring invalid id header");
    }
    parsed
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
