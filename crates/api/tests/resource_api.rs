//! HTTP-level integration tests for the generic catalog endpoints.
//!
//! Document types stand in for every catalog; users and roles cover the
//! resources with domain guards.

mod common;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::Router;
use backoffice_core::types::DbId;
use common::{
    body_json, body_text, build_test_app, delete_auth, get_auth, login_as, patch_json_auth,
    post_auth, post_json_auth, put_json_auth,
};
use serde_json::{json, Value};
use sqlx::PgPool;

const BASE: &str = "/api/v1/document-types";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create_document_type(app: &Router, token: &str, code: &str) -> Value {
    let response = post_json_auth(
        app.clone(),
        BASE,
        json!({ "code": code, "name": format!("Tipo {code}") }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

fn row_ids(json: &Value) -> Vec<i64> {
    json["data"]["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect()
}

async fn role_id(pool: &PgPool, name: &str) -> DbId {
    sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn permission_id(pool: &PgPool, name: &str) -> DbId {
    sqlx::query_scalar("SELECT id FROM permissions WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Listing and reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_pages_and_reports_meta(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    for code in ["A", "B", "C"] {
        create_document_type(&app, &token, code).await;
    }

    let response = get_auth(
        app,
        &format!("{BASE}?per_page=2&page=2&sort=code&dir=asc"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let meta = &json["data"]["meta"];
    assert_eq!(meta["total"], 3);
    assert_eq!(meta["last_page"], 2);
    assert_eq!(meta["from"], 3);
    assert_eq!(meta["sort"], "code");
    assert_eq!(json["data"]["rows"][0]["code"], "C");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn filters_and_search_narrow_the_list(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    let a = create_document_type(&app, &token, "CED").await;
    create_document_type(&app, &token, "PAS").await;

    let by_filter = body_json(
        get_auth(app.clone(), &format!("{BASE}?filters%5Bcode%5D=CED"), &token).await,
    )
    .await;
    assert_eq!(row_ids(&by_filter), vec![a["id"].as_i64().unwrap()]);

    let by_search = body_json(get_auth(app, &format!("{BASE}?search=pas"), &token).await).await;
    assert_eq!(by_search["data"]["meta"]["total"], 1);
    assert_eq!(by_search["data"]["meta"]["search"], "pas");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn id_listing_is_newest_first(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    let a = create_document_type(&app, &token, "A").await["id"].as_i64().unwrap();
    create_document_type(&app, &token, "B").await;
    let c = create_document_type(&app, &token, "C").await["id"].as_i64().unwrap();

    let json = body_json(get_auth(app, &format!("{BASE}?ids={a},{c}"), &token).await).await;
    assert_eq!(row_ids(&json), vec![c, a]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn show_appends_and_options(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    let created = create_document_type(&app, &token, "CED").await;
    let id = created["id"].as_i64().unwrap();

    let shown = body_json(
        get_auth(app.clone(), &format!("{BASE}/{id}?append=label"), &token).await,
    )
    .await;
    assert_eq!(shown["data"]["item"]["label"], "CED - Tipo CED");
    assert_eq!(shown["data"]["meta"]["append"], json!(["label"]));

    let options = body_json(get_auth(app.clone(), &format!("{BASE}/options"), &token).await).await;
    assert_eq!(options["data"], json!([{ "id": id, "label": "Tipo CED" }]));

    let missing = get_auth(app, &format!("{BASE}/999999"), &token).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn viewer_can_read_but_not_write(pool: PgPool) {
    let (_, token) = login_as(&pool, "viewer").await;
    let app = build_test_app(pool);

    let list = get_auth(app.clone(), BASE, &token).await;
    assert_eq!(list.status(), StatusCode::OK);

    let create = post_json_auth(app.clone(), BASE, json!({ "code": "X", "name": "X" }), &token).await;
    assert_eq!(create.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(create).await["error"],
        "Missing permission document_types.create"
    );

    let users = get_auth(app, "/api/v1/users", &token).await;
    assert_eq!(users.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_and_duplicate_bodies_are_rejected(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    create_document_type(&app, &token, "CED").await;

    let empty = post_json_auth(app.clone(), BASE, json!({ "code": "", "name": "X" }), &token).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(empty).await["code"], "VALIDATION_ERROR");

    let duplicate =
        post_json_auth(app, BASE, json!({ "code": "CED", "name": "Otra" }), &token).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(duplicate).await["code"], "CONFLICT");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_update_is_rejected(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    let created = create_document_type(&app, &token, "CED").await;
    let id = created["id"].as_i64().unwrap();
    let seen = created["updated_at"].clone();

    let first = put_json_auth(
        app.clone(),
        &format!("{BASE}/{id}"),
        json!({ "name": "Cédula", "expected_updated_at": seen }),
        &token,
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["data"]["name"], "Cédula");

    let second = put_json_auth(
        app.clone(),
        &format!("{BASE}/{id}"),
        json!({ "name": "Cédula de identidad", "expected_updated_at": seen }),
        &token,
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["code"], "STALE_WRITE");

    // Without a token the write goes through.
    let blind = put_json_auth(app, &format!("{BASE}/{id}"), json!({ "sort_order": 4 }), &token).await;
    assert_eq!(blind.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_restore_and_force_delete(pool: PgPool) {
    let (_, editor) = login_as(&pool, "editor").await;
    let (_, admin) = login_as(&pool, "admin").await;
    let app = build_test_app(pool.clone());
    let id = create_document_type(&app, &editor, "CED").await["id"].as_i64().unwrap();
    let item = format!("{BASE}/{id}");

    let deleted = delete_auth(app.clone(), &item, &editor).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        get_auth(app.clone(), &item, &editor).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get_auth(app.clone(), &format!("{item}?with_trashed=1"), &editor)
            .await
            .status(),
        StatusCode::OK
    );
    assert_eq!(
        delete_auth(app.clone(), &item, &editor).await.status(),
        StatusCode::NOT_FOUND
    );

    let restored = post_auth(app.clone(), &format!("{item}/restore"), &editor).await;
    assert_eq!(restored.status(), StatusCode::OK);
    assert!(body_json(restored).await["data"]["deleted_at"].is_null());

    // Editors lack force_delete.
    let forbidden = delete_auth(app.clone(), &format!("{item}/force"), &editor).await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let forced = delete_auth(app, &format!("{item}/force"), &admin).await;
    assert_eq!(forced.status(), StatusCode::NO_CONTENT);
    let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_types")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(left, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn set_active_toggles_flag(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    let id = create_document_type(&app, &token, "CED").await["id"].as_i64().unwrap();

    let response = patch_json_auth(
        app,
        &format!("{BASE}/{id}/active"),
        json!({ "active": false }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["is_active"], false);
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_delete_counts_changed_rows(pool: PgPool) {
    let (_, token) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    let a = create_document_type(&app, &token, "A").await["id"].as_i64().unwrap();
    let b = create_document_type(&app, &token, "B").await["id"].as_i64().unwrap();
    let bulk = format!("{BASE}/bulk");

    let first = post_json_auth(
        app.clone(),
        &bulk,
        json!({ "action": "delete", "ids": [a, b] }),
        &token,
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        body_json(first).await["data"],
        json!({ "action": "delete", "affected": 2 })
    );

    let again = post_json_auth(
        app.clone(),
        &bulk,
        json!({ "action": "delete", "ids": [a, b] }),
        &token,
    )
    .await;
    assert_eq!(body_json(again).await["data"]["affected"], 0);

    let unknown = post_json_auth(app.clone(), &bulk, json!({ "action": "explode", "ids": [a] }), &token).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let both = post_json_auth(
        app,
        &bulk,
        json!({ "action": "restore", "ids": [a], "uuids": [] }),
        &token,
    )
    .await;
    assert_eq!(both.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn csv_export_downloads_with_filename(pool: PgPool) {
    let (_, token) = login_as(&pool, "viewer").await;
    let (_, editor) = login_as(&pool, "editor").await;
    let app = build_test_app(pool);
    create_document_type(&app, &editor, "CED").await;

    let response = get_auth(
        app.clone(),
        &format!("{BASE}/export?format=csv&filename=tipos"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/csv; charset=utf-8");
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        "attachment; filename=\"tipos.csv\""
    );

    let body = body_text(response).await;
    let mut lines = body.split("\r\n");
    assert_eq!(lines.next(), Some("Código,Nombre,Descripción,Activo,Orden"));
    assert!(lines.next().is_some_and(|line| line.starts_with("CED,Tipo CED,")));

    let unsupported = get_auth(app, &format!("{BASE}/export?format=pdf"), &token).await;
    assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Guards and role permissions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_role_cannot_be_deleted(pool: PgPool) {
    let (_, token) = login_as(&pool, "admin").await;
    let admin_role = role_id(&pool, "admin").await;
    let app = build_test_app(pool);

    let response = delete_auth(app.clone(), &format!("/api/v1/roles/{admin_role}"), &token).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["code"], "DOMAIN_RULE");

    let bulk = post_json_auth(
        app,
        "/api/v1/roles/bulk",
        json!({ "action": "deactivate", "ids": [admin_role] }),
        &token,
    )
    .await;
    assert_eq!(bulk.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_role_cannot_be_renamed_or_deactivated_by_update(pool: PgPool) {
    let (_, token) = login_as(&pool, "admin").await;
    let admin_role = role_id(&pool, "admin").await;
    let app = build_test_app(pool);
    let uri = format!("/api/v1/roles/{admin_role}");

    let deactivate = put_json_auth(app.clone(), &uri, json!({ "is_active": false }), &token).await;
    assert_eq!(deactivate.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(deactivate).await["error"],
        "The admin role cannot be deactivated"
    );

    let rename = put_json_auth(app.clone(), &uri, json!({ "name": "root" }), &token).await;
    assert_eq!(rename.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(rename).await["error"], "The admin role cannot be renamed");

    let describe = put_json_auth(
        app.clone(),
        &uri,
        json!({ "description": "Full access" }),
        &token,
    )
    .await;
    assert_eq!(describe.status(), StatusCode::OK);
    let role = body_json(describe).await;
    assert_eq!(role["data"]["name"], "admin");
    assert_eq!(role["data"]["is_active"], true);

    let delete = delete_auth(app, &uri, &token).await;
    assert_eq!(delete.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn users_cannot_deactivate_themselves(pool: PgPool) {
    let (admin_id, token) = login_as(&pool, "admin").await;
    let app = build_test_app(pool);

    let response = patch_json_auth(
        app.clone(),
        &format!("/api/v1/users/{admin_id}/active"),
        json!({ "active": false }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["error"],
        "Your own account cannot be deactivated"
    );

    let via_update = put_json_auth(
        app.clone(),
        &format!("/api/v1/users/{admin_id}"),
        json!({ "is_active": false }),
        &token,
    )
    .await;
    assert_eq!(via_update.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let me = get_auth(app.clone(), "/api/v1/auth/me", &token).await;
    assert_eq!(body_json(me).await["data"]["user"]["is_active"], true);

    let renamed = put_json_auth(
        app,
        &format!("/api/v1/users/{admin_id}"),
        json!({ "name": "Root" }),
        &token,
    )
    .await;
    assert_eq!(renamed.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn created_users_hide_password_and_resolve_by_uuid(pool: PgPool) {
    let (_, token) = login_as(&pool, "admin").await;
    let viewer_role = role_id(&pool, "viewer").await;
    let app = build_test_app(pool);

    let weak = post_json_auth(
        app.clone(),
        "/api/v1/users",
        json!({ "name": "Ana", "email": "ana@example.com", "password": "short", "role_id": viewer_role }),
        &token,
    )
    .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    let created = post_json_auth(
        app.clone(),
        "/api/v1/users",
        json!({
            "name": "Ana Pérez",
            "email": "ana@example.com",
            "password": "long-enough-password",
            "role_id": viewer_role
        }),
        &token,
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let user = body_json(created).await["data"].clone();
    assert!(user.get("password_hash").is_none());

    let uuid = user["uuid"].as_str().unwrap();
    let shown = get_auth(
        app,
        &format!("/api/v1/users/uuid/{uuid}?with=role&append=initials"),
        &token,
    )
    .await;
    assert_eq!(shown.status(), StatusCode::OK);
    let item = &body_json(shown).await["data"]["item"];
    assert_eq!(item["role"]["name"], "viewer");
    assert_eq!(item["initials"], "AP");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn permission_sync_replaces_grants(pool: PgPool) {
    let (_, admin) = login_as(&pool, "admin").await;
    let (_, editor) = login_as(&pool, "editor").await;
    let (_, viewer) = login_as(&pool, "viewer").await;
    let viewer_role = role_id(&pool, "viewer").await;
    let view_documents = permission_id(&pool, "document_types.view").await;
    let app = build_test_app(pool.clone());
    let uri = format!("/api/v1/roles/{viewer_role}/permissions");

    let not_admin = put_json_auth(
        app.clone(),
        &uri,
        json!({ "permission_ids": [view_documents] }),
        &editor,
    )
    .await;
    assert_eq!(not_admin.status(), StatusCode::FORBIDDEN);

    let unknown = put_json_auth(app.clone(), &uri, json!({ "permission_ids": [999999] }), &admin).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let synced = put_json_auth(
        app.clone(),
        &uri,
        json!({ "permission_ids": [view_documents] }),
        &admin,
    )
    .await;
    assert_eq!(synced.status(), StatusCode::OK);
    assert_eq!(
        body_json(synced).await["data"],
        json!({ "role_id": viewer_role, "permissions": ["document_types.view"] })
    );

    let revoked = get_auth(app, "/api/v1/payment-statuses", &viewer).await;
    assert_eq!(revoked.status(), StatusCode::FORBIDDEN);

    let audited: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE event = 'permissions_synced' AND auditable_id = $1",
    )
    .bind(viewer_role)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(audited, 1);
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn writes_are_listed_in_audit_logs(pool: PgPool) {
    let (admin_id, token) = login_as(&pool, "admin").await;
    let app = build_test_app(pool);
    let id = create_document_type(&app, &token, "CED").await["id"].as_i64().unwrap();

    let response = get_auth(
        app,
        "/api/v1/audit-logs?filters%5Bauditable_type%5D=document_types&filters%5Bevent%5D=created",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["meta"]["total"], 1);
    let entry = &json["data"]["rows"][0];
    assert_eq!(entry["user_id"], admin_id);
    assert_eq!(entry["auditable_id"], id);
    assert_eq!(entry["new_values"]["code"], "CED");
}
