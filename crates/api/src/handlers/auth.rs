//! Handlers for the `/auth` resource (login, current user).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use backoffice_core::error::CoreError;
use backoffice_core::roles::is_super_role;
use backoffice_core::types::DbId;
use backoffice_db::entity::Entity;
use backoffice_db::models::user::{initials, User};
use backoffice_db::repositories::{PermissionRepo, RoleRepo, UserRepo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{self, Change};
use crate::auth::jwt::generate_access_token;
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{client_info, AuthUser};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful authentication response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserInfo,
}

/// Public user info embedded in [`AuthResponse`].
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub uuid: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Response body for `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Value,
    pub role: String,
    pub permissions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Unknown emails and wrong passwords
/// get the same 401, and so does a deactivated account with a wrong password.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (ip_address, user_agent) = client_info(&headers);
    let invalid = || {
        AppError::Core(CoreError::Unauthorized(
            "Invalid email or password".into(),
        ))
    };

    let Some(user) = UserRepo::find_by_email(&state.pool, &input.email).await? else {
        return Err(invalid());
    };

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        tracing::info!(user_id = user.id, "Failed login");
        audit::record_raw(
            &state,
            None,
            ip_address,
            user_agent,
            Change::new(audit::EVENT_LOGIN_FAILED, User::TABLE).id(user.id),
        )
        .await;
        return Err(invalid());
    }

    // Only a caller who knows the password learns the account is disabled.
    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let role = UserRepo::role_name(&state.pool, user.id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Forbidden("Role is no longer available".into())))?;

    UserRepo::record_login(&state.pool, user.id).await?;

    let access_token = generate_access_token(user.id, &role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    audit::record_raw(
        &state,
        Some(user.id),
        ip_address,
        user_agent,
        Change::new(audit::EVENT_LOGIN, User::TABLE).id(user.id),
    )
    .await;
    tracing::info!(user_id = user.id, role = %role, "User logged in");

    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.config.jwt.expires_in(),
        user: UserInfo {
            id: user.id,
            uuid: user.uuid,
            name: user.name,
            email: user.email,
            role,
        },
    }))
}

/// GET /api/v1/auth/me
///
/// The authenticated user with its role and effective permissions. The
/// `admin` role lists every permission.
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let user = UserRepo::find_or_fail_by_id(&state.pool, auth_user.user_id).await?;

    let permissions = if is_super_role(&auth_user.role) {
        PermissionRepo::all(&state.pool)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect()
    } else {
        RoleRepo::permission_names(&state.pool, user.role_id).await?
    };

    let mut item = user.to_item();
    item["initials"] = json!(initials(&user.name));

    Ok(Json(DataResponse {
        data: MeResponse {
            user: item,
            role: auth_user.role,
            permissions,
        },
    }))
}

