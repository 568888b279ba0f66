//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`auth::Actor`] -- `AuthUser` plus client address and user agent, for auditing.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`rbac::authorize`] -- Checks a `{resource}.{ability}` permission.

pub mod auth;
pub mod rbac;
