//! Generic repository over any [`Entity`].
//!
//! `Repo<E>` is zero-sized; every operation is an associated function that
//! takes the pool, a connection, or a transaction as its first argument.
//! Single-statement operations accept any [`PgExecutor`], so the same call
//! works against `&PgPool` or `&mut *tx`.

use std::marker::PhantomData;

use backoffice_core::error::CoreError;
use backoffice_core::list_query::{Filters, ListQuery};
use backoffice_core::pagination::Page;
use backoffice_core::show_query::ShowQuery;
use backoffice_core::types::DbId;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::eager::Eager;
use crate::entity::{column_names, Entity, Target};
use crate::error::{RepoError, RepoResult};
use crate::sql::{self, Trashed};
use crate::values::{Fillable, SqlValue};

/// Generic data access for `E`.
pub struct Repo<E>(PhantomData<E>);

/// A page of entities plus the relations/counts loaded for it.
pub struct EagerPage<E> {
    pub page: Page<E>,
    pub eager: Eager,
}

impl<E: Entity> EagerPage<E> {
    /// Listing rows with relations and counts merged in.
    pub fn rows(&self) -> Vec<Map<String, Value>> {
        self.page
            .items
            .iter()
            .map(|entity| {
                let mut row = entity.to_row();
                self.eager.attach(entity.id(), &mut row);
                row
            })
            .collect()
    }
}

/// A single entity resolved through a [`ShowQuery`].
pub struct Shown<E> {
    pub entity: E,
    pub eager: Eager,
    /// Computed attributes that were requested and exist.
    pub appends: Vec<(String, Value)>,
}

impl<E: Entity> Shown<E> {
    pub fn item(&self) -> Value {
        let mut item = self.entity.to_item();
        if let Value::Object(map) = &mut item {
            self.eager.attach(self.entity.id(), map);
            for (name, value) in &self.appends {
                map.insert(name.clone(), value.clone());
            }
        }
        item
    }

    pub fn append_names(&self) -> Vec<String> {
        self.appends.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Mass operation applied by the `bulk_*` functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Delete,
    ForceDelete,
    Restore,
    SetActive(bool),
}

impl BulkAction {
    /// Parse `delete`, `force_delete`, `restore`, `activate`, `deactivate`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "delete" => Some(BulkAction::Delete),
            "force_delete" | "forceDelete" => Some(BulkAction::ForceDelete),
            "restore" => Some(BulkAction::Restore),
            "activate" => Some(BulkAction::SetActive(true)),
            "deactivate" => Some(BulkAction::SetActive(false)),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BulkAction::Delete => "delete",
            BulkAction::ForceDelete => "force_delete",
            BulkAction::Restore => "restore",
            BulkAction::SetActive(true) => "activate",
            BulkAction::SetActive(false) => "deactivate",
        }
    }
}

enum Key {
    Id(DbId),
    Uuid(Uuid),
}

enum Keys<'a> {
    Ids(&'a [DbId]),
    Uuids(&'a [Uuid]),
}

impl Keys<'_> {
    fn is_empty(&self) -> bool {
        match self {
            Keys::Ids(ids) => ids.is_empty(),
            Keys::Uuids(uuids) => uuids.is_empty(),
        }
    }
}

type Row = Vec<(&'static str, SqlValue)>;

impl<E: Entity> Repo<E> {
    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    /// Filtered, sorted `SELECT` for `query` without pagination.
    pub fn select_matching(query: &ListQuery) -> QueryBuilder<'static, Postgres> {
        let mut qb = sql::select::<E>();
        Self::push_conditions(&mut qb, query.search(), query.filters());
        let (column, dir) = sql::resolve_sort::<E>(query.sort(), query.dir());
        sql::push_order(&mut qb, column, dir);
        qb
    }

    /// Search, filter, sort, and paginate; eager-load `with` / `with_count`
    /// for the rows of the page.
    pub async fn paginate(
        pool: &PgPool,
        query: &ListQuery,
        with: &[String],
        with_count: &[String],
    ) -> RepoResult<EagerPage<E>> {
        let total = Self::count_matching(pool, query.search(), query.filters()).await?;

        let mut qb = Self::select_matching(query);
        sql::push_limit(&mut qb, query.per_page(), query.offset());
        let items: Vec<E> = qb.build_query_as().fetch_all(pool).await?;

        Self::eager_page(pool, items, total, query.page(), query.per_page(), with, with_count).await
    }

    /// Page through an explicit id set, always newest id first. Only the
    /// page and page size of `query` apply; search, filters, and sort do not.
    pub async fn paginate_by_ids_desc(
        pool: &PgPool,
        ids: &[DbId],
        query: &ListQuery,
        with: &[String],
        with_count: &[String],
    ) -> RepoResult<EagerPage<E>> {
        let (page, per_page) = (query.page(), query.per_page());
        if ids.is_empty() {
            return Ok(EagerPage {
                page: Page::empty(page, per_page),
                eager: Eager::empty(),
            });
        }

        let mut count_qb = sql::count::<E>();
        sql::push_trashed_scope::<E>(&mut count_qb, Trashed::Without);
        push_keys::<E>(&mut count_qb, &Keys::Ids(ids))?;
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        let mut qb = sql::select::<E>();
        sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
        push_keys::<E>(&mut qb, &Keys::Ids(ids))?;
        qb.push(" ORDER BY id DESC");
        sql::push_limit(&mut qb, per_page, query.offset());
        let items: Vec<E> = qb.build_query_as().fetch_all(pool).await?;

        Self::eager_page(pool, items, total, page, per_page, with, with_count).await
    }

    /// Every live row in default sort order.
    pub async fn all<'e, X>(executor: X) -> RepoResult<Vec<E>>
    where
        X: PgExecutor<'e>,
    {
        let mut qb = sql::select::<E>();
        sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
        let (column, dir) = E::DEFAULT_SORT;
        sql::push_order(&mut qb, column, dir);
        Ok(qb.build_query_as().fetch_all(executor).await?)
    }

    /// Live rows as JSON objects restricted to `columns`, ordered by the
    /// first column after `id`. Unknown column names are rejected.
    pub async fn all_projected<'e, X>(
        executor: X,
        columns: &[&str],
        active_only: bool,
    ) -> RepoResult<Vec<Map<String, Value>>>
    where
        X: PgExecutor<'e>,
    {
        if columns.is_empty() {
            return Err(CoreError::Validation("at least one column is required".into()).into());
        }
        if let Some(unknown) = columns
            .iter()
            .find(|c| !column_names::<E>().any(|known| known == **c))
        {
            return Err(CoreError::Validation(format!("unknown column '{unknown}'")).into());
        }

        let object = columns
            .iter()
            .map(|c| format!("'{c}', {c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut qb = QueryBuilder::new(format!(
            "SELECT jsonb_build_object({object}) FROM {} WHERE TRUE",
            E::TABLE
        ));
        sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
        if let (true, Some(active)) = (active_only, E::ACTIVE_COLUMN) {
            qb.push(format!(" AND {active} = TRUE"));
        }
        let order = columns.iter().find(|c| **c != "id").unwrap_or(&"id");
        qb.push(format!(" ORDER BY {order} ASC, id ASC"));

        let values: Vec<Value> = qb.build_query_scalar().fetch_all(executor).await?;
        Ok(values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Point lookups
    // -----------------------------------------------------------------------

    pub async fn find_by_id<'e, X>(executor: X, id: DbId) -> RepoResult<Option<E>>
    where
        X: PgExecutor<'e>,
    {
        Self::find_by_key(executor, Key::Id(id), Trashed::Without).await
    }

    pub async fn find_by_uuid<'e, X>(executor: X, uuid: Uuid) -> RepoResult<Option<E>>
    where
        X: PgExecutor<'e>,
    {
        Self::find_by_key(executor, Key::Uuid(uuid), Trashed::Without).await
    }

    pub async fn find_or_fail_by_id<'e, X>(executor: X, id: DbId) -> RepoResult<E>
    where
        X: PgExecutor<'e>,
    {
        Self::find_by_id(executor, id)
            .await?
            .ok_or_else(|| CoreError::not_found(E::NAME, id).into())
    }

    pub async fn find_or_fail_by_uuid<'e, X>(executor: X, uuid: Uuid) -> RepoResult<E>
    where
        X: PgExecutor<'e>,
    {
        Self::find_by_uuid(executor, uuid)
            .await?
            .ok_or_else(|| CoreError::not_found_uuid(E::NAME, uuid).into())
    }

    /// Rows for `ids` in id order; missing ids are skipped.
    pub async fn find_many_by_ids<'e, X>(
        executor: X,
        ids: &[DbId],
        include_trashed: bool,
    ) -> RepoResult<Vec<E>>
    where
        X: PgExecutor<'e>,
    {
        Self::find_many(executor, Keys::Ids(ids), include_trashed).await
    }

    pub async fn find_many_by_uuids<'e, X>(
        executor: X,
        uuids: &[Uuid],
        include_trashed: bool,
    ) -> RepoResult<Vec<E>>
    where
        X: PgExecutor<'e>,
    {
        Self::find_many(executor, Keys::Uuids(uuids), include_trashed).await
    }

    /// Find-or-fail honoring the show query's relations, counts, appends,
    /// and `with_trashed`.
    pub async fn show_by_id(pool: &PgPool, id: DbId, query: &ShowQuery) -> RepoResult<Shown<E>> {
        let entity = Self::find_by_key(pool, Key::Id(id), Trashed::from_flag(query.with_trashed()))
            .await?
            .ok_or_else(|| CoreError::not_found(E::NAME, id))?;
        Self::shown(pool, entity, query).await
    }

    pub async fn show_by_uuid(pool: &PgPool, uuid: Uuid, query: &ShowQuery) -> RepoResult<Shown<E>> {
        let entity =
            Self::find_by_key(pool, Key::Uuid(uuid), Trashed::from_flag(query.with_trashed()))
                .await?
                .ok_or_else(|| CoreError::not_found_uuid(E::NAME, uuid))?;
        Self::shown(pool, entity, query).await
    }

    pub async fn exists_by_id<'e, X>(executor: X, id: DbId) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        Self::exists_by_key(executor, Key::Id(id)).await
    }

    pub async fn exists_by_uuid<'e, X>(executor: X, uuid: Uuid) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        Self::exists_by_key(executor, Key::Uuid(uuid)).await
    }

    /// Rows matching `filters` (registered filters plus `trashed`).
    pub async fn count<'e, X>(executor: X, filters: &Filters) -> RepoResult<i64>
    where
        X: PgExecutor<'e>,
    {
        Self::count_matching(executor, None, filters).await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn create<'e, X, D>(executor: X, dto: &D) -> RepoResult<E>
    where
        X: PgExecutor<'e>,
        D: Fillable,
    {
        let row = Self::insert_row(dto);
        let mut qb = QueryBuilder::new(format!("INSERT INTO {} ", E::TABLE));
        if row.is_empty() {
            qb.push("DEFAULT VALUES");
        } else {
            let columns: Vec<&str> = row.iter().map(|(c, _)| *c).collect();
            push_values(&mut qb, &columns, vec![row]);
        }
        qb.push(format!(" RETURNING {}", E::COLUMNS));
        Ok(qb.build_query_as().fetch_one(executor).await?)
    }

    /// Insert every DTO with a single multi-row statement.
    ///
    /// All DTOs must produce the same column list.
    pub async fn create_many<'e, X, D>(executor: X, dtos: &[D]) -> RepoResult<Vec<E>>
    where
        X: PgExecutor<'e>,
        D: Fillable,
    {
        if dtos.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Row> = dtos.iter().map(Self::insert_row).collect();
        let columns = uniform_columns(&rows)?;
        if columns.is_empty() {
            return Err(CoreError::Validation("rows have no columns".into()).into());
        }

        let mut qb = QueryBuilder::new(format!("INSERT INTO {} ", E::TABLE));
        push_values(&mut qb, &columns, rows);
        qb.push(format!(" RETURNING {}", E::COLUMNS));
        Ok(qb.build_query_as().fetch_all(executor).await?)
    }

    /// Apply the DTO's provided attributes to a live row.
    pub async fn update<'e, X, D>(executor: X, target: Target<'_, E>, dto: &D) -> RepoResult<E>
    where
        X: PgExecutor<'e>,
        D: Fillable,
    {
        let id = target.id();
        let attrs = dto.attributes();
        if attrs.is_empty() && !E::TIMESTAMPS {
            return Self::find_or_fail_by_id(executor, id).await;
        }

        let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
        let mut first = true;
        for (column, value) in attrs {
            if !first {
                qb.push(", ");
            }
            first = false;
            qb.push(format!("{column} = "));
            value.push_bind(&mut qb);
        }
        if E::TIMESTAMPS {
            if !first {
                qb.push(", ");
            }
            qb.push("updated_at = NOW()");
        }
        qb.push(" WHERE TRUE");
        push_key::<E>(&mut qb, &Key::Id(id))?;
        sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
        qb.push(format!(" RETURNING {}", E::COLUMNS));

        qb.build_query_as()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| CoreError::not_found(E::NAME, id).into())
    }

    /// `INSERT ... ON CONFLICT (unique_by) DO UPDATE SET col = EXCLUDED.col`.
    ///
    /// `unique_by` and `update_columns` must be columns the rows provide.
    /// An empty `update_columns` turns conflicts into `DO NOTHING`.
    /// Returns the number of rows inserted or updated.
    pub async fn upsert<'e, X, D>(
        executor: X,
        dtos: &[D],
        unique_by: &[&str],
        update_columns: &[&str],
    ) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
        D: Fillable,
    {
        if dtos.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Row> = dtos.iter().map(Self::insert_row).collect();
        let columns = uniform_columns(&rows)?;
        if unique_by.is_empty() {
            return Err(CoreError::Validation("upsert needs at least one unique column".into()).into());
        }
        if let Some(unknown) = unique_by
            .iter()
            .chain(update_columns)
            .find(|c| !columns.iter().any(|col| *col == **c))
        {
            return Err(
                CoreError::Validation(format!("column '{unknown}' is not part of the rows")).into(),
            );
        }

        let mut qb = QueryBuilder::new(format!("INSERT INTO {} ", E::TABLE));
        push_values(&mut qb, &columns, rows);
        qb.push(format!(" ON CONFLICT ({}) ", unique_by.join(", ")));
        if update_columns.is_empty() {
            qb.push("DO NOTHING");
        } else {
            let mut set: Vec<String> = update_columns
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect();
            if E::TIMESTAMPS {
                set.push("updated_at = NOW()".to_string());
            }
            qb.push(format!("DO UPDATE SET {}", set.join(", ")));
        }
        Ok(qb.build().execute(executor).await?.rows_affected())
    }

    /// Soft-delete a live row (hard delete for tables without `deleted_at`).
    pub async fn delete<'e, X>(executor: X, target: Target<'_, E>) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        let ids = [target.id()];
        Ok(Self::bulk(executor, Keys::Ids(&ids), BulkAction::Delete).await? > 0)
    }

    /// Remove the row permanently, trashed or not.
    pub async fn force_delete<'e, X>(executor: X, target: Target<'_, E>) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        let ids = [target.id()];
        Ok(Self::bulk(executor, Keys::Ids(&ids), BulkAction::ForceDelete).await? > 0)
    }

    /// Clear `deleted_at`. Returns `true` when the row exists, so restoring
    /// a live row is a successful no-op.
    pub async fn restore<'e, X>(executor: X, target: Target<'_, E>) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        Self::require_soft_deletes()?;
        let id = target.id();
        let result = sqlx::query(&format!(
            "UPDATE {} SET deleted_at = NULL WHERE id = $1",
            E::TABLE
        ))
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_active<'e, X>(executor: X, target: Target<'_, E>, active: bool) -> RepoResult<E>
    where
        X: PgExecutor<'e>,
    {
        let column = Self::active_column()?;
        let id = target.id();
        let mut qb = QueryBuilder::new(format!("UPDATE {} SET {column} = ", E::TABLE));
        qb.push_bind(active);
        if E::TIMESTAMPS {
            qb.push(", updated_at = NOW()");
        }
        qb.push(" WHERE TRUE");
        push_key::<E>(&mut qb, &Key::Id(id))?;
        sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
        qb.push(format!(" RETURNING {}", E::COLUMNS));

        qb.build_query_as()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| CoreError::not_found(E::NAME, id).into())
    }

    // -----------------------------------------------------------------------
    // Bulk
    // -----------------------------------------------------------------------

    pub async fn bulk_by_ids<'e, X>(executor: X, ids: &[DbId], action: BulkAction) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Ids(ids), action).await
    }

    pub async fn bulk_by_uuids<'e, X>(
        executor: X,
        uuids: &[Uuid],
        action: BulkAction,
    ) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Uuids(uuids), action).await
    }

    /// Soft-delete live rows; already-trashed rows are not counted.
    pub async fn bulk_delete_by_ids<'e, X>(executor: X, ids: &[DbId]) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Ids(ids), BulkAction::Delete).await
    }

    pub async fn bulk_delete_by_uuids<'e, X>(executor: X, uuids: &[Uuid]) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Uuids(uuids), BulkAction::Delete).await
    }

    pub async fn bulk_force_delete_by_ids<'e, X>(executor: X, ids: &[DbId]) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Ids(ids), BulkAction::ForceDelete).await
    }

    pub async fn bulk_force_delete_by_uuids<'e, X>(executor: X, uuids: &[Uuid]) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Uuids(uuids), BulkAction::ForceDelete).await
    }

    /// Restore trashed rows; live rows are not counted.
    pub async fn bulk_restore_by_ids<'e, X>(executor: X, ids: &[DbId]) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Ids(ids), BulkAction::Restore).await
    }

    pub async fn bulk_restore_by_uuids<'e, X>(executor: X, uuids: &[Uuid]) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Uuids(uuids), BulkAction::Restore).await
    }

    pub async fn bulk_set_active_by_ids<'e, X>(
        executor: X,
        ids: &[DbId],
        active: bool,
    ) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Ids(ids), BulkAction::SetActive(active)).await
    }

    pub async fn bulk_set_active_by_uuids<'e, X>(
        executor: X,
        uuids: &[Uuid],
        active: bool,
    ) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        Self::bulk(executor, Keys::Uuids(uuids), BulkAction::SetActive(active)).await
    }

    // -----------------------------------------------------------------------
    // Pessimistic locking
    // -----------------------------------------------------------------------

    /// `SELECT ... FOR UPDATE` on a live row inside `tx`.
    pub async fn find_for_update_by_id(tx: &mut Transaction<'_, Postgres>, id: DbId) -> RepoResult<E> {
        Self::find_for_update(tx, Key::Id(id))
            .await?
            .ok_or_else(|| CoreError::not_found(E::NAME, id).into())
    }

    pub async fn find_for_update_by_uuid(
        tx: &mut Transaction<'_, Postgres>,
        uuid: Uuid,
    ) -> RepoResult<E> {
        Self::find_for_update(tx, Key::Uuid(uuid))
            .await?
            .ok_or_else(|| CoreError::not_found_uuid(E::NAME, uuid).into())
    }

    /// Lock the row for the rest of `tx` and run `callback` with the
    /// transaction's connection and the locked entity.
    ///
    /// The lock is released when the caller commits or rolls back `tx`.
    pub async fn with_pessimistic_lock_by_id<T, F>(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        callback: F,
    ) -> RepoResult<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection, E) -> BoxFuture<'c, RepoResult<T>>,
    {
        let entity = Self::find_for_update_by_id(tx, id).await?;
        callback(&mut **tx, entity).await
    }

    pub async fn with_pessimistic_lock_by_uuid<T, F>(
        tx: &mut Transaction<'_, Postgres>,
        uuid: Uuid,
        callback: F,
    ) -> RepoResult<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection, E) -> BoxFuture<'c, RepoResult<T>>,
    {
        let entity = Self::find_for_update_by_uuid(tx, uuid).await?;
        callback(&mut **tx, entity).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn push_conditions(qb: &mut QueryBuilder<'static, Postgres>, search: Option<&str>, filters: &Filters) {
        sql::push_trashed_scope::<E>(qb, Trashed::from_filters(filters));
        sql::push_search::<E>(qb, search);
        sql::push_filters::<E>(qb, filters);
    }

    async fn count_matching<'e, X>(executor: X, search: Option<&str>, filters: &Filters) -> RepoResult<i64>
    where
        X: PgExecutor<'e>,
    {
        let mut qb = sql::count::<E>();
        Self::push_conditions(&mut qb, search, filters);
        Ok(qb.build_query_scalar().fetch_one(executor).await?)
    }

    async fn eager_page(
        pool: &PgPool,
        items: Vec<E>,
        total: i64,
        page: u32,
        per_page: u32,
        with: &[String],
        with_count: &[String],
    ) -> RepoResult<EagerPage<E>> {
        let ids: Vec<DbId> = items.iter().map(Entity::id).collect();
        let eager = Eager::load::<E>(pool, &ids, with, with_count).await?;
        Ok(EagerPage {
            page: Page::new(items, total, page, per_page),
            eager,
        })
    }

    async fn shown(pool: &PgPool, entity: E, query: &ShowQuery) -> RepoResult<Shown<E>> {
        let eager = Eager::load::<E>(pool, &[entity.id()], query.relations(), query.counts()).await?;
        let appends = query
            .appends()
            .iter()
            .filter(|name| E::APPENDS.iter().any(|known| *known == name.as_str()))
            .filter_map(|name| entity.appended(name).map(|value| (name.clone(), value)))
            .collect();
        Ok(Shown {
            entity,
            eager,
            appends,
        })
    }

    async fn find_by_key<'e, X>(executor: X, key: Key, trashed: Trashed) -> RepoResult<Option<E>>
    where
        X: PgExecutor<'e>,
    {
        let mut qb = sql::select::<E>();
        push_key::<E>(&mut qb, &key)?;
        sql::push_trashed_scope::<E>(&mut qb, trashed);
        Ok(qb.build_query_as().fetch_optional(executor).await?)
    }

    async fn find_many<'e, X>(executor: X, keys: Keys<'_>, include_trashed: bool) -> RepoResult<Vec<E>>
    where
        X: PgExecutor<'e>,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = sql::select::<E>();
        sql::push_trashed_scope::<E>(&mut qb, Trashed::from_flag(include_trashed));
        push_keys::<E>(&mut qb, &keys)?;
        qb.push(" ORDER BY id ASC");
        Ok(qb.build_query_as().fetch_all(executor).await?)
    }

    async fn find_for_update(tx: &mut Transaction<'_, Postgres>, key: Key) -> RepoResult<Option<E>> {
        let mut qb = sql::select::<E>();
        push_key::<E>(&mut qb, &key)?;
        sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
        qb.push(" FOR UPDATE");
        Ok(qb.build_query_as().fetch_optional(&mut **tx).await?)
    }

    async fn exists_by_key<'e, X>(executor: X, key: Key) -> RepoResult<bool>
    where
        X: PgExecutor<'e>,
    {
        let mut qb = QueryBuilder::new(format!("SELECT EXISTS (SELECT 1 FROM {} WHERE TRUE", E::TABLE));
        push_key::<E>(&mut qb, &key)?;
        sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
        qb.push(")");
        Ok(qb.build_query_scalar().fetch_one(executor).await?)
    }

    async fn bulk<'e, X>(executor: X, keys: Keys<'_>, action: BulkAction) -> RepoResult<u64>
    where
        X: PgExecutor<'e>,
    {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut qb = match action {
            BulkAction::Delete if E::SOFT_DELETES => QueryBuilder::new(format!(
                "UPDATE {} SET deleted_at = NOW() WHERE deleted_at IS NULL",
                E::TABLE
            )),
            BulkAction::Delete | BulkAction::ForceDelete => {
                QueryBuilder::new(format!("DELETE FROM {} WHERE TRUE", E::TABLE))
            }
            BulkAction::Restore => {
                Self::require_soft_deletes()?;
                QueryBuilder::new(format!(
                    "UPDATE {} SET deleted_at = NULL WHERE deleted_at IS NOT NULL",
                    E::TABLE
                ))
            }
            BulkAction::SetActive(active) => {
                let column = Self::active_column()?;
                let mut qb = QueryBuilder::new(format!("UPDATE {} SET {column} = ", E::TABLE));
                qb.push_bind(active);
                if E::TIMESTAMPS {
                    qb.push(", updated_at = NOW()");
                }
                qb.push(" WHERE TRUE");
                sql::push_trashed_scope::<E>(&mut qb, Trashed::Without);
                qb
            }
        };
        push_keys::<E>(&mut qb, &keys)?;

        Ok(qb.build().execute(executor).await?.rows_affected())
    }

    /// DTO attributes plus a generated uuid when the table has one and the
    /// DTO did not set it.
    fn insert_row<D: Fillable>(dto: &D) -> Row {
        let mut row = dto.attributes();
        if let Some(column) = E::UUID_COLUMN {
            if !row.iter().any(|(c, _)| *c == column) {
                row.push((column, SqlValue::from(Uuid::now_v7())));
            }
        }
        row
    }

    fn active_column() -> RepoResult<&'static str> {
        E::ACTIVE_COLUMN.ok_or_else(|| {
            CoreError::Validation(format!("{} has no active flag", E::NAME)).into()
        })
    }

    fn require_soft_deletes() -> RepoResult<()> {
        if E::SOFT_DELETES {
            Ok(())
        } else {
            Err(CoreError::Validation(format!("{} cannot be restored", E::NAME)).into())
        }
    }
}

fn uuid_column<E: Entity>() -> RepoResult<&'static str> {
    E::UUID_COLUMN
        .ok_or_else(|| RepoError::from(CoreError::Validation(format!("{} has no uuid", E::NAME))))
}

fn push_key<E: Entity>(qb: &mut QueryBuilder<'static, Postgres>, key: &Key) -> RepoResult<()> {
    match key {
        Key::Id(id) => {
            qb.push(" AND id = ");
            qb.push_bind(*id);
        }
        Key::Uuid(uuid) => {
            let column = uuid_column::<E>()?;
            qb.push(format!(" AND {column} = "));
            qb.push_bind(*uuid);
        }
    }
    Ok(())
}

fn push_keys<E: Entity>(qb: &mut QueryBuilder<'static, Postgres>, keys: &Keys<'_>) -> RepoResult<()> {
    match keys {
        Keys::Ids(ids) => {
            qb.push(" AND id = ANY(");
            qb.push_bind(ids.to_vec());
        }
        Keys::Uuids(uuids) => {
            let column = uuid_column::<E>()?;
            qb.push(format!(" AND {column} = ANY("));
            qb.push_bind(uuids.to_vec());
        }
    }
    qb.push(")");
    Ok(())
}

/// Column list shared by every row, in the first row's order.
fn uniform_columns(rows: &[Row]) -> RepoResult<Vec<&'static str>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&'static str> = first.iter().map(|(c, _)| *c).collect();
    for row in &rows[1..] {
        if !row.iter().map(|(c, _)| *c).eq(columns.iter().copied()) {
            return Err(CoreError::Validation("all rows must provide the same columns".into()).into());
        }
    }
    Ok(columns)
}

/// `(c1, c2) VALUES ($1, $2), ($3, $4)`.
fn push_values(qb: &mut QueryBuilder<'static, Postgres>, columns: &[&str], rows: Vec<Row>) {
    qb.push(format!("({}) VALUES ", columns.join(", ")));
    for (i, row) in rows.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push("(");
        for (j, (_, value)) in row.into_iter().enumerate() {
            if j > 0 {
                qb.push(", ");
            }
            value.push_bind(qb);
        }
        qb.push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn row(columns: &[&'static str]) -> Row {
        columns
            .iter()
            .map(|c| (*c, SqlValue::from("x")))
            .collect()
    }

    #[test]
    fn bulk_action_names_round_trip() {
        for action in [
            BulkAction::Delete,
            BulkAction::ForceDelete,
            BulkAction::Restore,
            BulkAction::SetActive(true),
            BulkAction::SetActive(false),
        ] {
            assert_eq!(BulkAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(BulkAction::parse("truncate"), None);
    }

    #[test]
    fn uniform_columns_rejects_mixed_rows() {
        let ok = uniform_columns(&[row(&["code", "name"]), row(&["code", "name"])]).unwrap();
        assert_eq!(ok, vec!["code", "name"]);

        let err = uniform_columns(&[row(&["code", "name"]), row(&["code"])]).unwrap_err();
        assert_matches!(err, RepoError::Core(CoreError::Validation(_)));
    }

    #[test]
    fn multi_row_values_are_numbered_in_order() {
        let mut qb = QueryBuilder::new("INSERT INTO t ");
        push_values(&mut qb, &["a", "b"], vec![row(&["a", "b"]), row(&["a", "b"])]);
        assert_eq!(qb.sql(), "INSERT INTO t (a, b) VALUES ($1, $2), ($3, $4)");
    }
}
