//! User lookups used by authentication.

use backoffice_core::types::DbId;
use sqlx::PgExecutor;

use crate::entity::Entity;
use crate::error::RepoResult;
use crate::models::user::User;
use crate::repository::Repo;

impl Repo<User> {
    /// Live user by email, case-insensitive.
    pub async fn find_by_email<'e, X>(executor: X, email: &str) -> RepoResult<Option<User>>
    where
        X: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {} FROM users WHERE email = LOWER($1) AND deleted_at IS NULL",
            User::COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(executor)
            .await?)
    }

    /// Stamp `last_login_at` without touching `updated_at`, so a login does
    /// not invalidate an editor's optimistic-lock token.
    pub async fn record_login<'e, X>(executor: X, id: DbId) -> RepoResult<()>
    where
        X: PgExecutor<'e>,
    {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Name of the user's role, if the user and role are both live.
    pub async fn role_name<'e, X>(executor: X, user_id: DbId) -> RepoResult<Option<String>>
    where
        X: PgExecutor<'e>,
    {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM users u \
             JOIN roles r ON r.id = u.role_id \
             WHERE u.id = $1 AND u.deleted_at IS NULL AND r.deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?)
    }
}
