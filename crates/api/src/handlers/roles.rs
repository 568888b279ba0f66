//! Role-specific endpoints that do not fit the generic resource handlers.

use axum::extract::{Path, State};
use axum::Json;
use backoffice_core::types::DbId;
use backoffice_db::entity::Entity;
use backoffice_db::models::role::Role;
use backoffice_db::repositories::RoleRepo;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{self, Change};
use crate::error::AppResult;
use crate::middleware::auth::Actor;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /roles/{id}/permissions`.
#[derive(Debug, Deserialize)]
pub struct SyncPermissionsRequest {
    pub permission_ids: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct RolePermissions {
    pub role_id: DbId,
    pub permissions: Vec<String>,
}

/// PUT /api/v1/roles/{id}/permissions
///
/// Replace the role's grant set. The role row stays locked until the new
/// set is committed, so concurrent syncs apply one after the other.
pub async fn sync_permissions(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    actor: Actor,
    Path(id): Path<DbId>,
    Json(input): Json<SyncPermissionsRequest>,
) -> AppResult<Json<DataResponse<RolePermissions>>> {
    let ids = input.permission_ids;
    let (before, after) = state
        .service::<Role>()
        .transaction(move |tx| {
            Box::pin(async move {
                RoleRepo::with_pessimistic_lock_by_id(tx, id, move |conn, _role| {
                    Box::pin(async move {
                        let before = RoleRepo::permission_names(&mut *conn, id).await?;
                        RoleRepo::sync_permissions(&mut *conn, id, &ids).await?;
                        let after = RoleRepo::permission_names(&mut *conn, id).await?;
                        Ok((before, after))
                    })
                })
                .await
            })
        })
        .await?;

    if before != after {
        audit::record(
            &state,
            &actor,
            Change::new(audit::EVENT_PERMISSIONS_SYNCED, Role::TABLE)
                .id(id)
                .old(json!({ "permissions": before }))
                .new_values(json!({ "permissions": after })),
        )
        .await;
    }
    tracing::info!(role_id = id, user_id = actor.user.user_id, count = after.len(), "Role permissions synced");

    Ok(Json(DataResponse {
        data: RolePermissions {
            role_id: id,
            permissions: after,
        },
    }))
}
