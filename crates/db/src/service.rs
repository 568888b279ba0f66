//! Service layer over [`Repo`]: response shaping, optimistic locking,
//! transactions, and export streaming.

use std::marker::PhantomData;

use backoffice_core::error::CoreError;
use backoffice_core::export::{
    encode_stream, export_filename, requested_filename, BoolLabels, ExportColumns, ExportFormat,
};
use backoffice_core::list_query::{Filters, ListQuery, SortDir};
use backoffice_core::pagination::PageMeta;
use backoffice_core::show_query::ShowQuery;
use backoffice_core::types::{DbId, Timestamp};
use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::entity::{column_names, Entity, Target};
use crate::error::{RepoError, RepoResult};
use crate::repository::{BulkAction, EagerPage, Repo, Shown};
use crate::sql;
use crate::values::Fillable;

/// Encoded chunks buffered between the database cursor and the HTTP body.
const EXPORT_CHANNEL_CAPACITY: usize = 32;

/// `{rows, meta}` listing response.
#[derive(Debug, Serialize)]
pub struct ListResult {
    pub rows: Vec<Map<String, Value>>,
    pub meta: ListMeta,
}

#[derive(Debug, Serialize)]
pub struct ListMeta {
    #[serde(flatten)]
    pub page: PageMeta,
    /// Sort actually applied, after the allow-list check.
    pub sort: String,
    pub dir: SortDir,
    pub search: Option<String>,
    pub filters: Filters,
    pub with: Vec<String>,
    pub with_count: Vec<String>,
}

/// `{item, meta}` single-resource response.
#[derive(Debug, Serialize)]
pub struct ShowResult {
    pub item: Value,
    pub meta: ShowMeta,
}

#[derive(Debug, Serialize)]
pub struct ShowMeta {
    pub with: Vec<String>,
    pub with_count: Vec<String>,
    pub append: Vec<String>,
    pub with_trashed: bool,
}

/// `{id, label}` entry for select inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub id: Value,
    pub label: Value,
}

/// A running export: response headers plus the chunked body.
pub struct ExportStream {
    pub format: ExportFormat,
    pub content_type: &'static str,
    pub filename: String,
    pub body: ReceiverStream<Result<String, RepoError>>,
}

/// CRUD orchestration for one entity type.
pub struct CrudService<E> {
    pool: PgPool,
    labels: BoolLabels,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for CrudService<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            labels: self.labels.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> CrudService<E> {
    pub fn new(pool: PgPool) -> Self {
        Self::with_labels(pool, BoolLabels::default())
    }

    /// Service whose exports render booleans with `labels`.
    pub fn with_labels(pool: PgPool, labels: BoolLabels) -> Self {
        Self {
            pool,
            labels,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn list(
        &self,
        query: &ListQuery,
        with: &[String],
        with_count: &[String],
    ) -> RepoResult<ListResult> {
        let page = Repo::<E>::paginate(&self.pool, query, with, with_count).await?;
        let (sort, dir) = sql::resolve_sort::<E>(query.sort(), query.dir());
        tracing::debug!(entity = E::NAME, total = page.page.total, "Listed");
        Ok(shape_list(
            page,
            sort,
            dir,
            query.search().map(str::to_string),
            query.filters().clone(),
        ))
    }

    /// Listing restricted to `ids`, newest id first.
    pub async fn list_by_ids_desc(
        &self,
        ids: &[DbId],
        query: &ListQuery,
        with: &[String],
        with_count: &[String],
    ) -> RepoResult<ListResult> {
        let page =
            Repo::<E>::paginate_by_ids_desc(&self.pool, ids, query, with, with_count).await?;
        Ok(shape_list(page, "id", SortDir::Desc, None, Filters::new()))
    }

    /// Live, active rows projected to `{id, label}`.
    pub async fn options(&self) -> RepoResult<Vec<SelectOption>> {
        let rows = Repo::<E>::all_projected(&self.pool, &["id", E::LABEL_COLUMN], true).await?;
        Ok(rows
            .into_iter()
            .map(|mut row| SelectOption {
                id: row.remove("id").unwrap_or(Value::Null),
                label: row.remove(E::LABEL_COLUMN).unwrap_or(Value::Null),
            })
            .collect())
    }

    pub async fn count(&self, filters: &Filters) -> RepoResult<i64> {
        Repo::<E>::count(&self.pool, filters).await
    }

    pub async fn get_by_id(&self, id: DbId) -> RepoResult<Option<E>> {
        Repo::<E>::find_by_id(&self.pool, id).await
    }

    pub async fn get_or_fail_by_id(&self, id: DbId) -> RepoResult<E> {
        Repo::<E>::find_or_fail_by_id(&self.pool, id).await
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> RepoResult<Option<E>> {
        Repo::<E>::find_by_uuid(&self.pool, uuid).await
    }

    pub async fn get_or_fail_by_uuid(&self, uuid: Uuid) -> RepoResult<E> {
        Repo::<E>::find_or_fail_by_uuid(&self.pool, uuid).await
    }

    pub async fn show_by_id(&self, id: DbId, query: &ShowQuery) -> RepoResult<ShowResult> {
        let shown = Repo::<E>::show_by_id(&self.pool, id, query).await?;
        Ok(shape_show(shown, query))
    }

    pub async fn show_by_uuid(&self, uuid: Uuid, query: &ShowQuery) -> RepoResult<ShowResult> {
        let shown = Repo::<E>::show_by_uuid(&self.pool, uuid, query).await?;
        Ok(shape_show(shown, query))
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// Stream every row matching `query` (search, filters, sort; no paging)
    /// through the exporter for `format`.
    ///
    /// Rows are read from a database cursor on a background task and pushed
    /// through a bounded channel, so memory stays flat regardless of the
    /// result size. `columns = None` uses the entity's default projection.
    pub fn export(
        &self,
        query: &ListQuery,
        format: ExportFormat,
        columns: Option<ExportColumns>,
        filename: Option<&str>,
    ) -> ExportStream {
        let exporter = format.exporter();
        let columns = columns.unwrap_or_else(default_export_columns::<E>);
        let filename = match filename.map(str::trim).filter(|name| !name.is_empty()) {
            Some(requested) => requested_filename(requested, format),
            None => export_filename(E::EXPORT_BASENAME, format, chrono::Utc::now()),
        };

        let (sender, receiver) = mpsc::channel(EXPORT_CHANNEL_CAPACITY);
        let pool = self.pool.clone();
        let labels = self.labels.clone();
        let mut qb = Repo::<E>::select_matching(query);
        let export_name = filename.clone();

        tokio::spawn(async move {
            let rows = qb
                .build_query_as::<E>()
                .fetch(&pool)
                .map_ok(|entity| entity.to_row())
                .map_err(RepoError::from);
            let mut chunks = std::pin::pin!(encode_stream(exporter, columns, labels, rows));
            let mut records = 0usize;
            while let Some(chunk) = chunks.next().await {
                let failed = chunk.is_err();
                if let Err(err) = &chunk {
                    tracing::error!(entity = E::NAME, error = %err, "Export aborted");
                }
                if sender.send(chunk).await.is_err() {
                    tracing::debug!(entity = E::NAME, "Export receiver dropped");
                    return;
                }
                if failed {
                    return;
                }
                records += 1;
            }
            // Preamble and epilogue are chunks too.
            tracing::info!(
                entity = E::NAME,
                file = %export_name,
                rows = records.saturating_sub(2),
                "Export finished"
            );
        });

        ExportStream {
            format,
            content_type: exporter.content_type(),
            filename,
            body: ReceiverStream::new(receiver),
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn create<D: Fillable>(&self, dto: &D) -> RepoResult<E> {
        let created = Repo::<E>::create(&self.pool, dto).await?;
        tracing::info!(entity = E::NAME, id = created.id(), "Created");
        Ok(created)
    }

    pub async fn create_many<D: Fillable>(&self, dtos: &[D]) -> RepoResult<Vec<E>> {
        let created = Repo::<E>::create_many(&self.pool, dtos).await?;
        tracing::info!(entity = E::NAME, count = created.len(), "Created many");
        Ok(created)
    }

    pub async fn upsert<D: Fillable>(
        &self,
        dtos: &[D],
        unique_by: &[&str],
        update_columns: &[&str],
    ) -> RepoResult<u64> {
        let affected = Repo::<E>::upsert(&self.pool, dtos, unique_by, update_columns).await?;
        tracing::info!(entity = E::NAME, affected, "Upserted");
        Ok(affected)
    }

    /// Update a live row.
    ///
    /// With `expected_updated_at`, the row is locked and its `updated_at`
    /// compared at microsecond precision first; a mismatch fails with
    /// [`CoreError::StaleWrite`] and nothing is written.
    pub async fn update<D: Fillable>(
        &self,
        target: Target<'_, E>,
        dto: &D,
        expected_updated_at: Option<Timestamp>,
    ) -> RepoResult<E> {
        let id = target.id();
        let Some(expected) = expected_updated_at else {
            let updated = Repo::<E>::update(&self.pool, Target::Id(id), dto).await?;
            tracing::info!(entity = E::NAME, id, "Updated");
            return Ok(updated);
        };

        let mut tx = self.pool.begin().await?;
        let current = Repo::<E>::find_for_update_by_id(&mut tx, id).await?;
        let stored = current.updated_at().map(|t| t.timestamp_micros());
        if stored != Some(expected.timestamp_micros()) {
            tx.rollback().await?;
            tracing::warn!(entity = E::NAME, id, "Stale write rejected");
            return Err(CoreError::StaleWrite {
                entity: E::NAME,
                id,
            }
            .into());
        }
        let updated = Repo::<E>::update(&mut *tx, Target::Id(id), dto).await?;
        tx.commit().await?;
        tracing::info!(entity = E::NAME, id, "Updated");
        Ok(updated)
    }

    pub async fn delete(&self, target: Target<'_, E>) -> RepoResult<bool> {
        let id = target.id();
        let deleted = Repo::<E>::delete(&self.pool, target).await?;
        tracing::info!(entity = E::NAME, id, deleted, "Deleted");
        Ok(deleted)
    }

    pub async fn force_delete(&self, target: Target<'_, E>) -> RepoResult<bool> {
        let id = target.id();
        let deleted = Repo::<E>::force_delete(&self.pool, target).await?;
        tracing::info!(entity = E::NAME, id, deleted, "Force deleted");
        Ok(deleted)
    }

    pub async fn restore(&self, target: Target<'_, E>) -> RepoResult<bool> {
        let id = target.id();
        let restored = Repo::<E>::restore(&self.pool, target).await?;
        tracing::info!(entity = E::NAME, id, restored, "Restored");
        Ok(restored)
    }

    pub async fn set_active(&self, target: Target<'_, E>, active: bool) -> RepoResult<E> {
        let updated = Repo::<E>::set_active(&self.pool, target, active).await?;
        tracing::info!(entity = E::NAME, id = updated.id(), active, "Active flag set");
        Ok(updated)
    }

    pub async fn bulk_by_ids(&self, ids: &[DbId], action: BulkAction) -> RepoResult<u64> {
        let affected = Repo::<E>::bulk_by_ids(&self.pool, ids, action).await?;
        tracing::info!(entity = E::NAME, action = action.as_str(), affected, "Bulk by ids");
        Ok(affected)
    }

    pub async fn bulk_by_uuids(&self, uuids: &[Uuid], action: BulkAction) -> RepoResult<u64> {
        let affected = Repo::<E>::bulk_by_uuids(&self.pool, uuids, action).await?;
        tracing::info!(entity = E::NAME, action = action.as_str(), affected, "Bulk by uuids");
        Ok(affected)
    }

    // -----------------------------------------------------------------------
    // Transactions and locks
    // -----------------------------------------------------------------------

    /// Run `callback` in a transaction: commit on `Ok`, roll back on `Err`.
    pub async fn transaction<T, F>(&self, callback: F) -> RepoResult<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'static, Postgres>) -> BoxFuture<'t, RepoResult<T>>,
    {
        let mut tx = self.pool.begin().await?;
        match callback(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(entity = E::NAME, error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// See [`Repo::with_pessimistic_lock_by_id`]; `tx` usually comes from
    /// [`CrudService::transaction`].
    pub async fn with_pessimistic_lock_by_id<T, F>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        callback: F,
    ) -> RepoResult<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection, E) -> BoxFuture<'c, RepoResult<T>>,
    {
        Repo::<E>::with_pessimistic_lock_by_id(tx, id, callback).await
    }

    pub async fn with_pessimistic_lock_by_uuid<T, F>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        uuid: Uuid,
        callback: F,
    ) -> RepoResult<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection, E) -> BoxFuture<'c, RepoResult<T>>,
    {
        Repo::<E>::with_pessimistic_lock_by_uuid(tx, uuid, callback).await
    }
}

/// `E::EXPORT_COLUMNS`, or every selected column labelled by its own name.
pub fn default_export_columns<E: Entity>() -> ExportColumns {
    if E::EXPORT_COLUMNS.is_empty() {
        ExportColumns::from_fields(column_names::<E>())
    } else {
        ExportColumns::new(E::EXPORT_COLUMNS.iter().copied())
    }
}

fn shape_list<E: Entity>(
    page: EagerPage<E>,
    sort: &str,
    dir: SortDir,
    search: Option<String>,
    filters: Filters,
) -> ListResult {
    let rows = page.rows();
    ListResult {
        rows,
        meta: ListMeta {
            page: page.page.meta(),
            sort: sort.to_string(),
            dir,
            search,
            filters,
            with: page.eager.relation_names(),
            with_count: page.eager.count_names(),
        },
    }
}

fn shape_show<E: Entity>(shown: Shown<E>, query: &ShowQuery) -> ShowResult {
    ShowResult {
        item: shown.item(),
        meta: ShowMeta {
            with: shown.eager.relation_names(),
            with_count: shown.eager.count_names(),
            append: shown.append_names(),
            with_trashed: query.with_trashed(),
        },
    }
}
