//! SQL fragments shared by the generic repository.
//!
//! Every builder here starts from `... WHERE TRUE` and appends ` AND ...`
//! clauses, binding all request-derived values. Column names only ever come
//! from an entity's `const` tables.

use backoffice_core::list_query::{FilterValue, Filters, SortDir};
use backoffice_core::types::Timestamp;
use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};

use crate::entity::{find_filter, Entity, FilterKind};

/// Reserved filter name controlling soft-delete visibility.
pub const TRASHED_FILTER: &str = "trashed";

/// Soft-delete visibility of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trashed {
    /// Live rows only.
    #[default]
    Without,
    With,
    Only,
}

impl Trashed {
    /// Read `filters[trashed]=with|only`; anything else keeps the default scope.
    pub fn from_filters(filters: &Filters) -> Self {
        match filters.get(TRASHED_FILTER).and_then(FilterValue::as_str) {
            Some("with") => Trashed::With,
            Some("only") => Trashed::Only,
            _ => Trashed::Without,
        }
    }

    pub fn from_flag(with_trashed: bool) -> Self {
        if with_trashed {
            Trashed::With
        } else {
            Trashed::Without
        }
    }
}

/// `SELECT <columns> FROM <table> WHERE TRUE`.
pub fn select<E: Entity>() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!("SELECT {} FROM {} WHERE TRUE", E::COLUMNS, E::TABLE))
}

/// `SELECT COUNT(*) FROM <table> WHERE TRUE`.
pub fn count<E: Entity>() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", E::TABLE))
}

pub fn push_trashed_scope<E: Entity>(qb: &mut QueryBuilder<'static, Postgres>, trashed: Trashed) {
    if !E::SOFT_DELETES {
        return;
    }
    match trashed {
        Trashed::Without => {
            qb.push(" AND deleted_at IS NULL");
        }
        Trashed::Only => {
            qb.push(" AND deleted_at IS NOT NULL");
        }
        Trashed::With => {}
    }
}

/// Case-insensitive partial match of `term` ORed across `E::SEARCHABLE`.
pub fn push_search<E: Entity>(qb: &mut QueryBuilder<'static, Postgres>, term: Option<&str>) {
    let Some(term) = term else { return };
    if E::SEARCHABLE.is_empty() {
        return;
    }
    let pattern = like_pattern(term);
    qb.push(" AND (");
    for (i, column) in E::SEARCHABLE.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(format!("{column}::text ILIKE "));
        qb.push_bind(pattern.clone());
    }
    qb.push(")");
}

/// Apply every filter `E` registers. Unregistered names and values of the
/// wrong shape are skipped. Returns how many predicates were added.
pub fn push_filters<E: Entity>(qb: &mut QueryBuilder<'static, Postgres>, filters: &Filters) -> usize {
    let mut applied = 0;
    for (name, value) in filters {
        let Some(def) = find_filter::<E>(name) else {
            continue;
        };
        if push_filter(qb, def.kind, value) {
            applied += 1;
        }
    }
    applied
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, kind: FilterKind, value: &FilterValue) -> bool {
    match kind {
        FilterKind::EqText(column) => match value {
            FilterValue::Scalar(v) => {
                qb.push(format!(" AND {column} = "));
                qb.push_bind(v.clone());
                true
            }
            FilterValue::List(items) => {
                qb.push(format!(" AND {column} = ANY("));
                qb.push_bind(items.clone());
                qb.push(")");
                true
            }
            FilterValue::Range { .. } => false,
        },
        FilterKind::Like(column) => match value.as_str() {
            Some(v) => {
                qb.push(format!(" AND {column} ILIKE "));
                qb.push_bind(like_pattern(v));
                true
            }
            None => false,
        },
        FilterKind::EqInt(column) => match value {
            FilterValue::Scalar(_) => match value.as_i64() {
                Some(v) => {
                    qb.push(format!(" AND {column} = "));
                    qb.push_bind(v);
                    true
                }
                None => false,
            },
            FilterValue::List(_) => {
                let ids = value.as_i64_list();
                if ids.is_empty() {
                    return false;
                }
                qb.push(format!(" AND {column} = ANY("));
                qb.push_bind(ids);
                qb.push(")");
                true
            }
            FilterValue::Range { .. } => false,
        },
        FilterKind::Flag(column) => match value.as_bool() {
            Some(flag) => {
                qb.push(format!(" AND {column} = "));
                qb.push_bind(flag);
                true
            }
            None => false,
        },
        FilterKind::DateRange(column) => {
            let Some((from, to)) = value.as_range() else {
                return false;
            };
            let from = from.and_then(parse_instant);
            let to = to.and_then(parse_instant);
            if from.is_none() && to.is_none() {
                return false;
            }
            if let Some((start, _)) = from {
                qb.push(format!(" AND {column} >= "));
                qb.push_bind(start);
            }
            if let Some((end, date_only)) = to {
                if date_only {
                    // A bare date includes the whole day.
                    match end.checked_add_days(Days::new(1)) {
                        Some(next_day) => {
                            qb.push(format!(" AND {column} < "));
                            qb.push_bind(next_day);
                        }
                        None => {
                            qb.push(format!(" AND {column} <= "));
                            qb.push_bind(end);
                        }
                    }
                } else {
                    qb.push(format!(" AND {column} <= "));
                    qb.push_bind(end);
                }
            }
            true
        }
        FilterKind::Custom(apply) => apply(qb, value),
    }
}

/// Requested sort if allow-listed, otherwise the entity's default sort.
pub fn resolve_sort<E: Entity>(requested: Option<&str>, dir: SortDir) -> (&'static str, SortDir) {
    requested
        .and_then(|column| E::SORTABLE.iter().find(|allowed| **allowed == column))
        .map(|column| (*column, dir))
        .unwrap_or(E::DEFAULT_SORT)
}

/// `ORDER BY <column> <dir>`, tie-broken on `id` for a stable page order.
pub fn push_order(qb: &mut QueryBuilder<'static, Postgres>, column: &str, dir: SortDir) {
    qb.push(format!(" ORDER BY {column} {}", dir.as_sql()));
    if column != "id" {
        qb.push(format!(", id {}", dir.as_sql()));
    }
}

pub fn push_limit(qb: &mut QueryBuilder<'static, Postgres>, limit: u32, offset: i64) {
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(limit));
    qb.push(" OFFSET ");
    qb.push_bind(offset);
}

/// `%term%` with LIKE wildcards in `term` escaped.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Parse `YYYY-MM-DD` (start of day, UTC) or an RFC 3339 instant.
/// The flag is `true` for the date-only form.
fn parse_instant(raw: &str) -> Option<(Timestamp, bool)> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
        return Some((midnight, true));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| (dt.with_timezone(&Utc), false))
}
