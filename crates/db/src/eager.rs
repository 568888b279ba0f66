//! Batched eager loading of relations and relation counts.
//!
//! One query per requested relation covers every owner row on the page:
//! related rows are aggregated to JSON in Postgres, keyed by owner id.

use std::collections::{BTreeMap, HashMap};

use backoffice_core::types::DbId;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::entity::{find_relation, Entity, RelationDef, RelationKind};

/// Loaded relations and counts for a set of owner rows.
#[derive(Debug, Default, Clone)]
pub struct Eager {
    relations: BTreeMap<&'static str, HashMap<DbId, Value>>,
    counts: BTreeMap<&'static str, HashMap<DbId, i64>>,
}

impl Eager {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the named relations and counts for `ids`.
    ///
    /// Names `E` does not declare are ignored.
    pub async fn load<E: Entity>(
        pool: &PgPool,
        ids: &[DbId],
        with: &[String],
        with_count: &[String],
    ) -> Result<Self, sqlx::Error> {
        let mut eager = Self::default();
        if ids.is_empty() {
            return Ok(eager);
        }

        for name in with {
            let Some(rel) = find_relation::<E>(name) else {
                continue;
            };
            let rows: Vec<(DbId, Option<Value>)> =
                sqlx::query_as(&relation_sql(E::TABLE, rel))
                    .bind(ids)
                    .fetch_all(pool)
                    .await?;
            let empty = match rel.kind {
                RelationKind::BelongsTo { .. } => Value::Null,
                _ => Value::Array(Vec::new()),
            };
            let loaded = rows
                .into_iter()
                .map(|(id, value)| (id, value.unwrap_or_else(|| empty.clone())))
                .collect();
            eager.relations.insert(rel.name, loaded);
        }

        for name in with_count {
            let Some(rel) = find_relation::<E>(name) else {
                continue;
            };
            let rows: Vec<(DbId, i64)> = sqlx::query_as(&count_sql(E::TABLE, rel))
                .bind(ids)
                .fetch_all(pool)
                .await?;
            eager.counts.insert(rel.name, rows.into_iter().collect());
        }

        Ok(eager)
    }

    /// Merge `row[name]` and `row["{name}_count"]` for owner `id`.
    pub fn attach(&self, id: DbId, row: &mut Map<String, Value>) {
        for (name, loaded) in &self.relations {
            let value = loaded.get(&id).cloned().unwrap_or(Value::Null);
            row.insert((*name).to_string(), value);
        }
        for (name, counts) in &self.counts {
            let count = counts.get(&id).copied().unwrap_or(0);
            row.insert(format!("{name}_count"), Value::from(count));
        }
    }

    /// Relations actually loaded, in name order.
    pub fn relation_names(&self) -> Vec<String> {
        self.relations.keys().map(|k| (*k).to_string()).collect()
    }

    /// Counts actually loaded, in name order.
    pub fn count_names(&self) -> Vec<String> {
        self.counts.keys().map(|k| (*k).to_string()).collect()
    }
}

/// Correlated predicate selecting the related rows of owner `o`.
fn related_condition(rel: &RelationDef) -> String {
    match rel.kind {
        RelationKind::BelongsTo { foreign_key } => format!("id = o.{foreign_key}"),
        RelationKind::HasMany { foreign_key } => format!("{foreign_key} = o.id"),
        RelationKind::BelongsToMany {
            pivot,
            owner_key,
            related_key,
        } => format!("id IN (SELECT {related_key} FROM {pivot} WHERE {owner_key} = o.id)"),
    }
}

fn related_scope(rel: &RelationDef) -> String {
    let mut scope = format!("FROM {} WHERE {}", rel.table, related_condition(rel));
    if rel.soft_deletes {
        scope.push_str(" AND deleted_at IS NULL");
    }
    scope
}

fn relation_sql(owner_table: &str, rel: &RelationDef) -> String {
    let inner = format!("SELECT {} {}", rel.columns, related_scope(rel));
    let value = match rel.kind {
        RelationKind::BelongsTo { .. } => format!("(SELECT to_jsonb(r) FROM ({inner}) r)"),
        _ => format!(
            "(SELECT COALESCE(jsonb_agg(to_jsonb(r) ORDER BY r.id), '[]'::jsonb) FROM ({inner}) r)"
        ),
    };
    format!("SELECT o.id, {value} FROM {owner_table} o WHERE o.id = ANY($1)")
}

fn count_sql(owner_table: &str, rel: &RelationDef) -> String {
    format!(
        "SELECT o.id, (SELECT COUNT(*) {}) FROM {owner_table} o WHERE o.id = ANY($1)",
        related_scope(rel)
    )
}
