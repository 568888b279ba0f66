//! Integration tests for the generic repository.
//!
//! Exercises `Repo<E>` against a real database to verify that:
//! - Pagination metadata matches the unpaginated match count
//! - Unknown filters are ignored and unknown sorts fall back to the default
//! - Id-set pagination is always newest-first
//! - Soft delete, restore, and bulk operations report what they touched
//! - Eager loading attaches relations and counts

use assert_matches::assert_matches;
use backoffice_core::error::CoreError;
use backoffice_core::list_query::{FilterValue, ListQuery, ListQueryConfig, SortDir};
use backoffice_core::show_query::ShowQuery;
use backoffice_db::entity::Target;
use backoffice_db::error::RepoError;
use backoffice_db::models::document_type::{CreateDocumentType, DocumentType, UpdateDocumentType};
use backoffice_db::models::permission::Permission;
use backoffice_db::models::role::{CreateRole, Role};
use backoffice_db::repositories::{DocumentTypeRepo, PermissionRepo, RoleRepo};
use backoffice_db::repository::BulkAction;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_document_type(code: &str) -> CreateDocumentType {
    CreateDocumentType {
        code: code.to_string(),
        name: format!("Tipo {code}"),
        description: None,
        is_active: None,
        sort_order: None,
    }
}

fn query() -> ListQuery {
    ListQuery::new(&ListQueryConfig::default())
}

async fn seed(pool: &PgPool, codes: &[&str]) -> Vec<DocumentType> {
    let mut created = Vec::new();
    for code in codes {
        created.push(
            DocumentTypeRepo::create(pool, &new_document_type(code))
                .await
                .unwrap(),
        );
    }
    created
}

fn ids(rows: &[DocumentType]) -> Vec<i64> {
    rows.iter().map(|r| r.id).collect()
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_page_of_three_rows(pool: PgPool) {
    seed(&pool, &["A", "B", "C"]).await;

    let q = query().with_per_page(2).with_page(2);
    let result = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();

    assert_eq!(result.page.items.len(), 1);
    assert_eq!(result.page.total, 3);
    assert_eq!(result.page.last_page(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_filter_is_ignored(pool: PgPool) {
    seed(&pool, &["A", "B"]).await;

    let q = query().with_filter("does_not_exist", FilterValue::scalar("x"));
    let result = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(result.page.total, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn registered_filters_narrow_the_result(pool: PgPool) {
    let rows = seed(&pool, &["A", "B", "C"]).await;
    DocumentTypeRepo::set_active(&pool, Target::Id(rows[0].id), false)
        .await
        .unwrap();

    let q = query().with_filter("is_active", FilterValue::scalar("false"));
    let result = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(ids(&result.page.items), vec![rows[0].id]);

    let q = query().with_filter("code", FilterValue::list(["B", "C"]));
    let result = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(result.page.total, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sort_outside_allow_list_uses_default_order(pool: PgPool) {
    seed(&pool, &["B", "A", "C"]).await;

    let default = DocumentTypeRepo::paginate(&pool, &query(), &[], &[]).await.unwrap();
    let q = query().with_sort("secret_column", SortDir::Asc);
    let rejected = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(ids(&default.page.items), ids(&rejected.page.items));

    let q = query().with_sort("code", SortDir::Asc);
    let by_code = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    let codes: Vec<&str> = by_code.page.items.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["A", "B", "C"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn search_matches_literally(pool: PgPool) {
    seed(&pool, &["50%", "500"]).await;

    let q = query().with_search("0%");
    let result = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(result.page.total, 1);
    assert_eq!(result.page.items[0].code, "50%");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn id_pages_are_newest_first(pool: PgPool) {
    let rows = seed(&pool, &["A", "B", "C", "D"]).await;
    let requested = vec![rows[0].id, rows[2].id, rows[1].id];

    let result = DocumentTypeRepo::paginate_by_ids_desc(&pool, &requested, &query(), &[], &[])
        .await
        .unwrap();
    assert_eq!(
        ids(&result.page.items),
        vec![rows[2].id, rows[1].id, rows[0].id]
    );
    assert_eq!(result.page.total, 3);

    let empty = DocumentTypeRepo::paginate_by_ids_desc(&pool, &[], &query(), &[], &[])
        .await
        .unwrap();
    assert!(empty.page.items.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn id_pages_honor_the_configured_page_size_cap(pool: PgPool) {
    let codes: Vec<String> = (0..120).map(|n| format!("T{n:03}")).collect();
    let code_refs: Vec<&str> = codes.iter().map(String::as_str).collect();
    let rows = seed(&pool, &code_refs).await;

    let config = ListQueryConfig {
        default_per_page: 15,
        max_per_page: 200,
    };
    let q = ListQuery::new(&config).with_per_page(150);
    let result = DocumentTypeRepo::paginate_by_ids_desc(&pool, &ids(&rows), &q, &[], &[])
        .await
        .unwrap();

    assert_eq!(result.page.per_page, 150);
    assert_eq!(result.page.items.len(), 120);
    assert_eq!(result.page.total, 120);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn trashed_filter_controls_visibility(pool: PgPool) {
    let rows = seed(&pool, &["A", "B"]).await;
    DocumentTypeRepo::delete(&pool, Target::Id(rows[0].id)).await.unwrap();

    let live = DocumentTypeRepo::paginate(&pool, &query(), &[], &[]).await.unwrap();
    assert_eq!(live.page.total, 1);

    let q = query().with_filter("trashed", FilterValue::scalar("with"));
    let all = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(all.page.total, 2);

    let q = query().with_filter("trashed", FilterValue::scalar("only"));
    let only = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(ids(&only.page.items), vec![rows[0].id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn projected_options_skip_inactive_rows(pool: PgPool) {
    let rows = seed(&pool, &["A", "B"]).await;
    DocumentTypeRepo::set_active(&pool, Target::Id(rows[1].id), false)
        .await
        .unwrap();

    let options = DocumentTypeRepo::all_projected(&pool, &["id", "name"], true)
        .await
        .unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0]["name"], "Tipo A");

    let err = DocumentTypeRepo::all_projected(&pool, &["id", "password"], false)
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Lookups and writes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn find_or_fail_reports_not_found(pool: PgPool) {
    let err = DocumentTypeRepo::find_or_fail_by_id(&pool, 999_999)
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::Core(CoreError::NotFound { .. }));

    let err = DocumentTypeRepo::find_by_uuid(&pool, uuid::Uuid::nil())
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_changes_only_provided_fields(pool: PgPool) {
    let created = seed(&pool, &["A"]).await.remove(0);
    let dto = UpdateDocumentType {
        name: Some("Cédula".to_string()),
        ..Default::default()
    };

    let updated = DocumentTypeRepo::update(&pool, Target::Model(&created), &dto)
        .await
        .unwrap();
    assert_eq!(updated.name, "Cédula");
    assert_eq!(updated.code, "A");
    assert!(updated.updated_at >= created.updated_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_many_inserts_in_one_statement(pool: PgPool) {
    let created = DocumentTypeRepo::create_many(
        &pool,
        &[new_document_type("A"), new_document_type("B")],
    )
    .await
    .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].code, "B");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn upsert_updates_on_conflict(pool: PgPool) {
    seed(&pool, &["A"]).await;
    let mut changed = new_document_type("A");
    changed.name = "Renombrado".to_string();

    let affected = DocumentTypeRepo::upsert(
        &pool,
        &[changed, new_document_type("B")],
        &["code"],
        &["name"],
    )
    .await
    .unwrap();
    assert_eq!(affected, 2);

    let q = query().with_sort("code", SortDir::Asc);
    let rows = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(rows.page.items[0].name, "Renombrado");
    assert_eq!(rows.page.total, 2);

    let err = DocumentTypeRepo::upsert(&pool, &[new_document_type("C")], &["code"], &["nope"])
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn restore_of_live_row_is_a_no_op(pool: PgPool) {
    let created = seed(&pool, &["A"]).await.remove(0);

    assert!(DocumentTypeRepo::restore(&pool, Target::Id(created.id)).await.unwrap());
    assert!(DocumentTypeRepo::delete(&pool, Target::Id(created.id)).await.unwrap());
    assert!(!DocumentTypeRepo::delete(&pool, Target::Id(created.id)).await.unwrap());
    assert!(DocumentTypeRepo::find_by_id(&pool, created.id).await.unwrap().is_none());

    assert!(DocumentTypeRepo::restore(&pool, Target::Id(created.id)).await.unwrap());
    assert!(DocumentTypeRepo::find_by_id(&pool, created.id).await.unwrap().is_some());
    assert!(!DocumentTypeRepo::restore(&pool, Target::Id(999_999)).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn show_honors_with_trashed(pool: PgPool) {
    let created = seed(&pool, &["A"]).await.remove(0);
    DocumentTypeRepo::delete(&pool, Target::Id(created.id)).await.unwrap();

    let err = DocumentTypeRepo::show_by_id(&pool, created.id, &ShowQuery::new())
        .await
        .err()
        .unwrap();
    assert_matches!(err, RepoError::Core(CoreError::NotFound { .. }));

    let q = ShowQuery::new().including_trashed(true).with_appends(["label", "bogus"]);
    let shown = DocumentTypeRepo::show_by_id(&pool, created.id, &q).await.unwrap();
    assert_eq!(shown.item()["label"], "A - Tipo A");
    assert_eq!(shown.append_names(), vec!["label"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn tables_without_flags_reject_flag_operations(pool: PgPool) {
    let permission = PermissionRepo::all(&pool).await.unwrap().remove(0);

    let err = PermissionRepo::set_active(&pool, Target::Model(&permission), false)
        .await
        .err()
        .unwrap();
    assert_matches!(err, RepoError::Core(CoreError::Validation(_)));

    let err = PermissionRepo::restore(&pool, Target::Id(permission.id))
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_delete_twice_affects_nothing_the_second_time(pool: PgPool) {
    let rows = seed(&pool, &["A", "B", "C"]).await;
    let targets = vec![rows[0].id, rows[1].id];

    assert_eq!(DocumentTypeRepo::bulk_delete_by_ids(&pool, &targets).await.unwrap(), 2);
    assert_eq!(DocumentTypeRepo::bulk_delete_by_ids(&pool, &targets).await.unwrap(), 0);
    assert_eq!(DocumentTypeRepo::bulk_delete_by_ids(&pool, &[]).await.unwrap(), 0);

    assert_eq!(DocumentTypeRepo::bulk_restore_by_ids(&pool, &ids(&rows)).await.unwrap(), 2);
    assert_eq!(DocumentTypeRepo::bulk_force_delete_by_ids(&pool, &targets).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_set_active_counts_rows(pool: PgPool) {
    let rows = seed(&pool, &["A", "B", "C"]).await;
    let affected = DocumentTypeRepo::bulk_by_ids(
        &pool,
        &[rows[0].id, rows[2].id],
        BulkAction::SetActive(false),
    )
    .await
    .unwrap();
    assert_eq!(affected, 2);

    let q = query().with_filter("is_active", FilterValue::scalar("0"));
    let inactive = DocumentTypeRepo::paginate(&pool, &q, &[], &[]).await.unwrap();
    assert_eq!(inactive.page.total, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_by_uuid_uses_the_uuid_column(pool: PgPool) {
    let editor = RoleRepo::find_by_name(&pool, "editor").await.unwrap().unwrap();
    let viewer = RoleRepo::find_by_name(&pool, "viewer").await.unwrap().unwrap();

    let affected = RoleRepo::bulk_set_active_by_uuids(&pool, &[editor.uuid, viewer.uuid], false)
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let reloaded = RoleRepo::find_or_fail_by_uuid(&pool, editor.uuid).await.unwrap();
    assert!(!reloaded.is_active);
}

// ---------------------------------------------------------------------------
// Eager loading and locking
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn relations_and_counts_are_attached(pool: PgPool) {
    let q = query()
        .with_filter("name", FilterValue::scalar("viewer"));
    let page = RoleRepo::paginate(
        &pool,
        &q,
        &["permissions".to_string(), "unknown".to_string()],
        &["permissions".to_string()],
    )
    .await
    .unwrap();

    let rows = page.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["permissions_count"], 6);
    assert_eq!(rows[0]["permissions"].as_array().map(Vec::len), Some(6));
    assert!(rows[0].get("unknown").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn pessimistic_lock_runs_callback_on_locked_row(pool: PgPool) {
    let created = seed(&pool, &["A"]).await.remove(0);

    let mut tx = pool.begin().await.unwrap();
    let renamed = DocumentTypeRepo::with_pessimistic_lock_by_id(&mut tx, created.id, |conn, locked| {
        Box::pin(async move {
            let dto = UpdateDocumentType {
                name: Some(format!("{} (bloqueado)", locked.name)),
                ..Default::default()
            };
            DocumentTypeRepo::update(conn, Target::Id(locked.id), &dto).await
        })
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(renamed.name, "Tipo A (bloqueado)");

    let mut tx = pool.begin().await.unwrap();
    let err = DocumentTypeRepo::with_pessimistic_lock_by_id(&mut tx, 999_999, |_, locked| {
        Box::pin(async move { Ok(locked.id) })
    })
    .await
    .unwrap_err();
    assert_matches!(err, RepoError::Core(CoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn permission_sync_replaces_grant_set(pool: PgPool) {
    let viewer = RoleRepo::find_by_name(&pool, "viewer").await.unwrap().unwrap();
    let all: Vec<Permission> = PermissionRepo::all(&pool).await.unwrap();
    let wanted: Vec<i64> = all
        .iter()
        .filter(|p| p.name.starts_with("roles."))
        .map(|p| p.id)
        .collect();

    let mut tx = pool.begin().await.unwrap();
    RoleRepo::find_for_update_by_id(&mut tx, viewer.id).await.unwrap();
    RoleRepo::sync_permissions(&mut tx, viewer.id, &wanted).await.unwrap();
    tx.commit().await.unwrap();

    let names = RoleRepo::permission_names(&pool, viewer.id).await.unwrap();
    assert_eq!(names.len(), wanted.len());
    assert!(names.iter().all(|n| n.starts_with("roles.")));
    assert!(RoleRepo::has_permission(&pool, viewer.id, "roles.view").await.unwrap());

    let mut tx = pool.begin().await.unwrap();
    let err = RoleRepo::sync_permissions(&mut tx, viewer.id, &[999_999])
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn role_is_a_plain_entity_too(pool: PgPool) {
    let roles: Vec<Role> = RoleRepo::all(&pool).await.unwrap();
    let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["admin", "editor", "viewer"]);
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn created_row_reads_back_with_its_fields(pool: PgPool) {
    let input = CreateDocumentType {
        code: "RUC".to_string(),
        name: "Registro Único".to_string(),
        description: Some("Contribuyentes".to_string()),
        is_active: Some(false),
        sort_order: Some(7),
    };
    let created = DocumentTypeRepo::create(&pool, &input).await.unwrap();

    let found = DocumentTypeRepo::find_by_id(&pool, created.id)
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(found.code, input.code);
    assert_eq!(found.name, input.name);
    assert_eq!(found.description, input.description);
    assert!(!found.is_active);
    assert_eq!(found.sort_order, 7);
    assert_eq!(found.created_at, created.created_at);
    assert!(found.deleted_at.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn exists_ignores_trashed_and_missing_rows(pool: PgPool) {
    let rows = seed(&pool, &["A", "B"]).await;
    DocumentTypeRepo::delete(&pool, Target::Id(rows[1].id)).await.unwrap();

    assert!(DocumentTypeRepo::exists_by_id(&pool, rows[0].id).await.unwrap());
    assert!(!DocumentTypeRepo::exists_by_id(&pool, rows[1].id).await.unwrap());
    assert!(!DocumentTypeRepo::exists_by_id(&pool, i64::MAX).await.unwrap());

    let role = RoleRepo::create(
        &pool,
        &CreateRole {
            name: "auditor".to_string(),
            description: None,
            is_active: None,
        },
    )
    .await
    .unwrap();
    assert!(RoleRepo::exists_by_uuid(&pool, role.uuid).await.unwrap());
    assert!(!RoleRepo::exists_by_uuid(&pool, uuid::Uuid::now_v7()).await.unwrap());

    RoleRepo::delete(&pool, Target::Id(role.id)).await.unwrap();
    assert!(!RoleRepo::exists_by_uuid(&pool, role.uuid).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn count_applies_registered_filters_and_trashed_scope(pool: PgPool) {
    let rows = seed(&pool, &["A", "B", "C"]).await;
    DocumentTypeRepo::set_active(&pool, Target::Id(rows[0].id), false)
        .await
        .unwrap();
    DocumentTypeRepo::delete(&pool, Target::Id(rows[2].id)).await.unwrap();

    let count = |q: ListQuery| {
        let pool = pool.clone();
        async move { DocumentTypeRepo::count(&pool, q.filters()).await.unwrap() }
    };

    assert_eq!(count(query()).await, 2);
    assert_eq!(
        count(query().with_filter("is_active", FilterValue::scalar("true"))).await,
        1
    );
    assert_eq!(
        count(query().with_filter("code", FilterValue::scalar("B"))).await,
        1
    );
    assert_eq!(
        count(query().with_filter("does_not_exist", FilterValue::scalar("x"))).await,
        2
    );
    assert_eq!(
        count(query().with_filter("trashed", FilterValue::scalar("only"))).await,
        1
    );
    assert_eq!(
        count(query().with_filter("trashed", FilterValue::scalar("with"))).await,
        3
    );
}
