pub mod health;
pub mod resource;

use axum::routing::{get, post, put};
use axum::Router;
use backoffice_db::models::audit_log::AuditLog;
use backoffice_db::models::document_type::DocumentType;
use backoffice_db::models::payment_status::PaymentStatus;
use backoffice_db::models::permission::Permission;
use backoffice_db::models::phone_area_code::PhoneAreaCode;
use backoffice_db::models::role::Role;
use backoffice_db::models::user::User;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/login                          login (public)
/// /auth/me                             current user, role, permissions
///
/// /document-types                      full CRUD (see resource::router)
/// /payment-statuses                    full CRUD
/// /phone-area-codes                    full CRUD
/// /users                               full CRUD
/// /roles                               full CRUD
/// /roles/{id}/permissions              replace grant set (PUT, admin only)
///
/// /permissions                         read-only (see resource::read_router)
/// /audit-logs                          read-only
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .nest("/document-types", resource::router::<DocumentType>())
        .nest("/payment-statuses", resource::router::<PaymentStatus>())
        .nest("/phone-area-codes", resource::router::<PhoneAreaCode>())
        .nest("/users", resource::router::<User>())
        .nest(
            "/roles",
            resource::router::<Role>().route(
                "/{id}/permissions",
                put(handlers::roles::sync_permissions),
            ),
        )
        .nest("/permissions", resource::read_router::<Permission>())
        .nest("/audit-logs", resource::read_router::<AuditLog>())
}
