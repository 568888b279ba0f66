//! First-run setup: make sure an administrator account exists.

use backoffice_core::error::CoreError;
use backoffice_core::roles::ROLE_ADMIN;
use backoffice_db::models::user::CreateUser;
use backoffice_db::repositories::{RoleRepo, UserRepo};
use backoffice_db::DbPool;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::config::BootstrapAdmin;
use crate::error::{AppError, AppResult};

/// Create the configured admin user unless the email is already taken.
///
/// Returns `true` when a user was created. An existing account is left
/// untouched, including its password and role.
pub async fn ensure_admin(pool: &DbPool, admin: &BootstrapAdmin) -> AppResult<bool> {
    if UserRepo::find_by_email(pool, &admin.email).await?.is_some() {
        tracing::debug!(email = %admin.email, "Bootstrap admin already present");
        return Ok(false);
    }

    validate_password_strength(&admin.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;
    let password_hash = hash_password(&admin.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let role = RoleRepo::find_by_name(pool, ROLE_ADMIN).await?.ok_or_else(|| {
        AppError::Core(CoreError::Internal(format!("Role {ROLE_ADMIN} is missing")))
    })?;

    let user = UserRepo::create(
        pool,
        &CreateUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password_hash,
            role_id: role.id,
            is_active: true,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, email = %user.email, "Bootstrap admin created");

    Ok(true)
}
