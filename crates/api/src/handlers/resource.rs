//! Generic handlers shared by every catalog resource.
//!
//! Each handler is instantiated per entity by [`crate::routes::resource`];
//! the entity's table name is the permission prefix and audit type.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use backoffice_core::error::CoreError;
use backoffice_core::export::ExportColumns;
use backoffice_core::list_query::ListQuery;
use backoffice_core::roles::{
    ABILITY_CREATE, ABILITY_DELETE, ABILITY_EXPORT, ABILITY_FORCE_DELETE, ABILITY_RESTORE,
    ABILITY_UPDATE, ABILITY_VIEW,
};
use backoffice_core::show_query::ShowQuery;
use backoffice_core::types::{DbId, Timestamp};
use backoffice_db::entity::{Entity, Target};
use backoffice_db::repository::{BulkAction, Repo};
use backoffice_db::service::{ListResult, SelectOption, ShowResult};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::audit::{self, Change};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{Actor, AuthUser};
use crate::middleware::rbac::authorize;
use crate::query::{self, Pairs};
use crate::resources::{Guarded, WriteResource};
use crate::response::{BulkResponse, DataResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// `PUT /{id}` body: the resource's fields plus the optional optimistic-lock
/// token (the `updated_at` the client last saw).
#[derive(Debug, Deserialize)]
pub struct UpdateBody<T> {
    #[serde(flatten)]
    pub fields: T,
    #[serde(default)]
    pub expected_updated_at: Option<Timestamp>,
}

/// `POST /bulk` body. Exactly one of `ids` / `uuids` is expected.
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: String,
    #[serde(default)]
    pub ids: Option<Vec<DbId>>,
    #[serde(default)]
    pub uuids: Option<Vec<Uuid>>,
}

/// `PATCH /{id}/active` body.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /{resource}
///
/// ListQuery parameters plus `with` / `with_count`. `ids=...` switches to
/// the id-set listing, always newest first.
pub async fn list<E: Entity>(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pairs): Query<Pairs>,
) -> AppResult<Json<DataResponse<ListResult>>> {
    authorize(&state, &user, E::TABLE, ABILITY_VIEW).await?;
    let query = ListQuery::from_pairs(&pairs, &state.config.list);
    let eager = ShowQuery::from_pairs(&pairs);
    let service = state.service::<E>();

    let result = match query::id_list(&pairs)? {
        Some(ids) => {
            service
                .list_by_ids_desc(&ids, &query, eager.relations(), eager.counts())
                .await?
        }
        None => {
            service
                .list(&query, eager.relations(), eager.counts())
                .await?
        }
    };
    Ok(Json(DataResponse { data: result }))
}

/// GET /{resource}/options
pub async fn options<E: Entity>(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SelectOption>>>> {
    authorize(&state, &user, E::TABLE, ABILITY_VIEW).await?;
    let options = state.service::<E>().options().await?;
    Ok(Json(DataResponse { data: options }))
}

/// GET /{resource}/{id}
pub async fn show<E: Entity>(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Query(pairs): Query<Pairs>,
) -> AppResult<Json<DataResponse<ShowResult>>> {
    authorize(&state, &user, E::TABLE, ABILITY_VIEW).await?;
    let query = ShowQuery::from_pairs(&pairs);
    let shown = state.service::<E>().show_by_id(id, &query).await?;
    Ok(Json(DataResponse { data: shown }))
}

/// GET /{resource}/uuid/{uuid}
pub async fn show_by_uuid<E: Entity>(
    State(state): State<AppState>,
    user: AuthUser,
    Path(uuid): Path<Uuid>,
    Query(pairs): Query<Pairs>,
) -> AppResult<Json<DataResponse<ShowResult>>> {
    authorize(&state, &user, E::TABLE, ABILITY_VIEW).await?;
    let query = ShowQuery::from_pairs(&pairs);
    let shown = state.service::<E>().show_by_uuid(uuid, &query).await?;
    Ok(Json(DataResponse { data: shown }))
}

/// GET /{resource}/export
///
/// Same search/filter/sort parameters as the listing, without paging, plus
/// `format`, `columns[field]=Label`, and `filename`. The body is streamed.
pub async fn export<E: Entity>(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pairs): Query<Pairs>,
) -> AppResult<Response> {
    authorize(&state, &user, E::TABLE, ABILITY_EXPORT).await?;
    let format = query::export_format(&pairs)?;
    let query = ListQuery::from_pairs(&pairs, &state.config.list);
    let columns = ExportColumns::from_pairs(&pairs);

    let export = state
        .service::<E>()
        .export(&query, format, columns, query::param(&pairs, "filename"));
    tracing::info!(
        entity = E::NAME,
        user_id = user.user_id,
        file = %export.filename,
        "Export started"
    );

    Response::builder()
        .header(CONTENT_TYPE, export.content_type)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export.filename),
        )
        .body(Body::from_stream(export.body))
        .map_err(|e| AppError::InternalError(format!("Failed to build export response: {e}")))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// POST /{resource}
pub async fn create<R: WriteResource>(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<R::Create>,
) -> AppResult<(StatusCode, Json<DataResponse<Value>>)> {
    authorize(&state, &actor.user, R::TABLE, ABILITY_CREATE).await?;
    input.validate()?;
    let row = R::create_row(input)?;

    let created = state.service::<R>().create(&row).await?;
    let item = created.to_item();
    audit::record(
        &state,
        &actor,
        Change::new(audit::EVENT_CREATED, R::TABLE)
            .id(created.id())
            .new_values(item.clone()),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: item })))
}

/// PUT /{resource}/{id}
///
/// With `expected_updated_at`, a row changed since the client read it is
/// rejected with 409 `STALE_WRITE`.
pub async fn update<R: WriteResource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<DbId>,
    Json(body): Json<UpdateBody<R::Update>>,
) -> AppResult<Json<DataResponse<Value>>> {
    authorize(&state, &actor.user, R::TABLE, ABILITY_UPDATE).await?;
    body.fields.validate()?;

    let service = state.service::<R>();
    let current = service.get_or_fail_by_id(id).await?;
    R::guard_update(&actor.user, &current, &body.fields)?;
    let row = R::update_row(body.fields)?;

    let updated = service
        .update(Target::Model(&current), &row, body.expected_updated_at)
        .await?;
    let item = updated.to_item();
    audit::record(
        &state,
        &actor,
        Change::new(audit::EVENT_UPDATED, R::TABLE)
            .id(id)
            .old(current.to_item())
            .new_values(item.clone()),
    )
    .await;
    Ok(Json(DataResponse { data: item }))
}

/// DELETE /{resource}/{id}
///
/// Soft delete; 404 when the row is already trashed.
pub async fn destroy<R: WriteResource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    authorize(&state, &actor.user, R::TABLE, ABILITY_DELETE).await?;
    let service = state.service::<R>();
    let current = service.get_or_fail_by_id(id).await?;
    R::guard(Guarded::Delete, &actor.user, &current)?;

    if !service.delete(Target::Model(&current)).await? {
        return Err(CoreError::not_found(R::NAME, id).into());
    }
    audit::record(
        &state,
        &actor,
        Change::new(audit::EVENT_DELETED, R::TABLE)
            .id(id)
            .old(current.to_item()),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /{resource}/{id}/force
///
/// Permanent removal, trashed or not.
pub async fn force_delete<R: WriteResource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    authorize(&state, &actor.user, R::TABLE, ABILITY_FORCE_DELETE).await?;
    let service = state.service::<R>();
    let current = Repo::<R>::find_many_by_ids(service.pool(), &[id], true)
        .await?
        .pop()
        .ok_or_else(|| CoreError::not_found(R::NAME, id))?;
    R::guard(Guarded::ForceDelete, &actor.user, &current)?;

    service.force_delete(Target::Model(&current)).await?;
    audit::record(
        &state,
        &actor,
        Change::new(audit::EVENT_FORCE_DELETED, R::TABLE)
            .id(id)
            .old(current.to_item()),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /{resource}/{id}/restore
///
/// Restoring a live row is a successful no-op.
pub async fn restore<R: WriteResource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Value>>> {
    authorize(&state, &actor.user, R::TABLE, ABILITY_RESTORE).await?;
    let service = state.service::<R>();
    if !service.restore(Target::Id(id)).await? {
        return Err(CoreError::not_found(R::NAME, id).into());
    }

    let restored = service.get_or_fail_by_id(id).await?;
    let item = restored.to_item();
    audit::record(
        &state,
        &actor,
        Change::new(audit::EVENT_RESTORED, R::TABLE)
            .id(id)
            .new_values(item.clone()),
    )
    .await;
    Ok(Json(DataResponse { data: item }))
}

/// PATCH /{resource}/{id}/active
pub async fn set_active<R: WriteResource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<DbId>,
    Json(input): Json<SetActiveRequest>,
) -> AppResult<Json<DataResponse<Value>>> {
    authorize(&state, &actor.user, R::TABLE, ABILITY_UPDATE).await?;
    let service = state.service::<R>();
    let current = service.get_or_fail_by_id(id).await?;
    if !input.active {
        R::guard(Guarded::Deactivate, &actor.user, &current)?;
    }

    let updated = service.set_active(Target::Model(&current), input.active).await?;
    let item = updated.to_item();
    let event = if input.active {
        audit::EVENT_ACTIVATED
    } else {
        audit::EVENT_DEACTIVATED
    };
    audit::record(
        &state,
        &actor,
        Change::new(event, R::TABLE).id(id).new_values(item.clone()),
    )
    .await;
    Ok(Json(DataResponse { data: item }))
}

/// POST /{resource}/bulk
///
/// `{ action, ids }` or `{ action, uuids }` with action `delete`,
/// `force_delete`, `restore`, `activate`, or `deactivate`. Responds with the
/// number of rows actually changed.
pub async fn bulk<R: WriteResource>(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<BulkRequest>,
) -> AppResult<Json<DataResponse<BulkResponse>>> {
    let action = BulkAction::parse(&input.action)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown bulk action: {}", input.action)))?;
    authorize(&state, &actor.user, R::TABLE, bulk_ability(action)).await?;

    let service = state.service::<R>();
    let pool = service.pool();
    let (affected, keys) = match (input.ids, input.uuids) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "Send either ids or uuids, not both".into(),
            ))
        }
        (Some(ids), None) => {
            let targets = Repo::<R>::find_many_by_ids(pool, &ids, true).await?;
            guard_all::<R>(action, &actor.user, &targets)?;
            (service.bulk_by_ids(&ids, action).await?, json!({ "ids": ids }))
        }
        (None, Some(uuids)) => {
            let targets = Repo::<R>::find_many_by_uuids(pool, &uuids, true).await?;
            guard_all::<R>(action, &actor.user, &targets)?;
            (
                service.bulk_by_uuids(&uuids, action).await?,
                json!({ "uuids": uuids }),
            )
        }
        (None, None) => (0, json!({})),
    };

    if affected > 0 {
        let mut values = keys;
        values["affected"] = json!(affected);
        audit::record(
            &state,
            &actor,
            Change::new(format!("bulk_{}", action.as_str()), R::TABLE).new_values(values),
        )
        .await;
    }
    Ok(Json(DataResponse {
        data: BulkResponse {
            action: action.as_str(),
            affected,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bulk_ability(action: BulkAction) -> &'static str {
    match action {
        BulkAction::Delete => ABILITY_DELETE,
        BulkAction::ForceDelete => ABILITY_FORCE_DELETE,
        BulkAction::Restore => ABILITY_RESTORE,
        BulkAction::SetActive(_) => ABILITY_UPDATE,
    }
}

fn guard_all<R: WriteResource>(
    action: BulkAction,
    actor: &AuthUser,
    targets: &[R],
) -> Result<(), CoreError> {
    let guarded = match action {
        BulkAction::Delete => Guarded::Delete,
        BulkAction::ForceDelete => Guarded::ForceDelete,
        BulkAction::SetActive(false) => Guarded::Deactivate,
        BulkAction::Restore | BulkAction::SetActive(true) => return Ok(()),
    };
    targets
        .iter()
        .try_for_each(|target| R::guard(guarded, actor, target))
}
