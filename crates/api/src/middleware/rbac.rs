//! Role-based access control.
//!
//! [`RequireAdmin`] rejects non-admin tokens at the extractor level. Resource
//! handlers call [`authorize`] with the resource and ability they need; the
//! `admin` role bypasses that check.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use backoffice_core::error::CoreError;
use backoffice_core::roles::{is_super_role, permission_name, ROLE_ADMIN};
use backoffice_db::repositories::RoleRepo;

use super::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Requires the `admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != ROLE_ADMIN {
            return Err(AppError::Core(CoreError::Forbidden(
                "Admin role required".into(),
            )));
        }
        Ok(RequireAdmin(user))
    }
}

/// Fail with 403 unless `user`'s role holds `{resource}.{ability}`.
pub async fn authorize(
    state: &AppState,
    user: &AuthUser,
    resource: &str,
    ability: &str,
) -> AppResult<()> {
    if is_super_role(&user.role) {
        return Ok(());
    }
    let permission = permission_name(resource, ability);
    if RoleRepo::name_has_permission(&state.pool, &user.role, &permission).await? {
        return Ok(());
    }
    tracing::debug!(user_id = user.user_id, role = %user.role, %permission, "Permission denied");
    Err(AppError::Core(CoreError::Forbidden(format!(
        "Missing permission {permission}"
    ))))
}
