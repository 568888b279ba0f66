//! Well-known role names and permission abilities.
//!
//! Role names must match the seed data in `20260301000001_create_rbac_tables.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EDITOR: &str = "editor";
pub const ROLE_VIEWER: &str = "viewer";

pub const ABILITY_VIEW: &str = "view";
pub const ABILITY_CREATE: &str = "create";
pub const ABILITY_UPDATE: &str = "update";
pub const ABILITY_DELETE: &str = "delete";
pub const ABILITY_RESTORE: &str = "restore";
pub const ABILITY_FORCE_DELETE: &str = "force_delete";
pub const ABILITY_EXPORT: &str = "export";

/// Build the permission name for `ability` on `resource`, e.g.
/// `permission_name("document_types", "export") == "document_types.export"`.
pub fn permission_name(resource: &str, ability: &str) -> String {
    format!("{resource}.{ability}")
}

/// Returns `true` if the role bypasses permission checks.
pub fn is_super_role(role: &str) -> bool {
    role == ROLE_ADMIN
}
