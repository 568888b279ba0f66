//! Role lookups and role/permission pivot maintenance.

use backoffice_core::error::CoreError;
use backoffice_core::types::DbId;
use sqlx::{PgConnection, PgExecutor};

use crate::entity::Entity;
use crate::error::RepoResult;
use crate::models::role::Role;
use crate::repository::Repo;

impl Repo<Role> {
    /// Live role by exact name.
    pub async fn find_by_name<'e, X>(executor: X, name: &str) -> RepoResult<Option<Role>>
    where
        X: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {} FROM roles WHERE name = $1 AND deleted_at IS NULL",
            Role::COLUMNS
        );
        Ok(sqlx::query_as::<_, Role>(&query)
            .bind(name)
            .fetch_optional(executor)
            .await?)
    }

    /// Permission names granted to a role, sorted.
    pub async fn permission_names<'e, X>(executor: X, role_id: DbId) -> RepoResult<Vec<String>>
    where
        X: PgExecutor<'e>,
    {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT p.name FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = $1 \
             ORDER BY p.name",
        )
        .bind(role_id)
        .fetch_all(executor)
        .await?)
    }

    pub async fn has_permission<'e, X>(executor: X, role_id: DbId, permission: &str) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM role_permissions rp \
                JOIN permissions p ON p.id = rp.permission_id \
                WHERE rp.role_id = $1 AND p.name = $2 \
             )",
        )
        .bind(role_id)
        .bind(permission)
        .fetch_one(executor)
        .await?)
    }

    /// Same check keyed by role name, as carried in access tokens. Inactive
    /// or trashed roles hold nothing.
    pub async fn name_has_permission<'e, X>(executor: X, role: &str, permission: &str) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM roles r \
                JOIN role_permissions rp ON rp.role_id = r.id \
                JOIN permissions p ON p.id = rp.permission_id \
                WHERE r.name = $1 AND p.name = $2 \
                  AND r.is_active AND r.deleted_at IS NULL \
             )",
        )
        .bind(role)
        .bind(permission)
        .fetch_one(executor)
        .await?)
    }

    /// Make `permission_ids` the exact grant set of the role.
    ///
    /// Runs two statements on `conn`; call it inside a transaction (usually
    /// under a lock on the role row). Unknown permission ids fail with
    /// [`CoreError::Validation`] before anything changes. Returns the number
    /// of pivot rows removed plus inserted.
    pub async fn sync_permissions(
        conn: &mut PgConnection,
        role_id: DbId,
        permission_ids: &[DbId],
    ) -> RepoResult<u64> {
        let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE id = ANY($1)")
            .bind(permission_ids)
            .fetch_one(&mut *conn)
            .await?;
        let mut requested = permission_ids.to_vec();
        requested.sort_unstable();
        requested.dedup();
        if known != requested.len() as i64 {
            return Err(CoreError::Validation("unknown permission id".into()).into());
        }

        let removed = sqlx::query(
            "DELETE FROM role_permissions WHERE role_id = $1 AND NOT (permission_id = ANY($2))",
        )
        .bind(role_id)
        .bind(&requested)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let added = sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) \
             SELECT $1, UNNEST($2::BIGINT[]) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(&requested)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(removed + added)
    }
}
