//! Generic route sets for catalog resources.

use axum::routing::{delete, get, patch, post};
use axum::Router;
use backoffice_db::entity::Entity;

use crate::handlers::resource;
use crate::resources::WriteResource;
use crate::state::AppState;

/// Read-only routes for any entity.
///
/// ```text
/// GET    /                  -> list
/// GET    /options           -> options
/// GET    /export            -> export
/// GET    /uuid/{uuid}       -> show_by_uuid
/// GET    /{id}              -> show
/// ```
pub fn read_router<E: Entity>() -> Router<AppState> {
    Router::new()
        .route("/", get(resource::list::<E>))
        .route("/options", get(resource::options::<E>))
        .route("/export", get(resource::export::<E>))
        .route("/uuid/{uuid}", get(resource::show_by_uuid::<E>))
        .route("/{id}", get(resource::show::<E>))
}

/// Full CRUD routes for a writable resource.
///
/// ```text
/// GET    /                  -> list
/// POST   /                  -> create
/// GET    /options           -> options
/// GET    /export            -> export
/// POST   /bulk              -> bulk
/// GET    /uuid/{uuid}       -> show_by_uuid
/// GET    /{id}              -> show
/// PUT    /{id}              -> update
/// DELETE /{id}              -> destroy (soft delete)
/// DELETE /{id}/force        -> force_delete
/// POST   /{id}/restore      -> restore
/// PATCH  /{id}/active       -> set_active
/// ```
pub fn router<R: WriteResource>() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(resource::list::<R>).post(resource::create::<R>),
        )
        .route("/options", get(resource::options::<R>))
        .route("/export", get(resource::export::<R>))
        .route("/bulk", post(resource::bulk::<R>))
        .route("/uuid/{uuid}", get(resource::show_by_uuid::<R>))
        .route(
            "/{id}",
            get(resource::show::<R>)
                .put(resource::update::<R>)
                .delete(resource::destroy::<R>),
        )
        .route("/{id}/force", delete(resource::force_delete::<R>))
        .route("/{id}/restore", post(resource::restore::<R>))
        .route("/{id}/active", patch(resource::set_active::<R>))
}
