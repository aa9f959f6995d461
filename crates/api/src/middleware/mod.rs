//! Request extractors.
//!
//! - [`tenant::TenantContext`] -- tenant and acting user from request headers.

pub mod tenant;
