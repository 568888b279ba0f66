//! Static description of a table for the generic repository.
//!
//! Each model implements [`Entity`] with `const` tables: which columns are
//! selected, searchable, and sortable, which filters it recognizes, which
//! relations can be eager-loaded. The repository reads only these tables,
//! so every column name that reaches SQL text is a `&'static str` written by
//! a developer, never request input.

use backoffice_core::list_query::{FilterValue, SortDir};
use backoffice_core::types::{DbId, Timestamp};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres, QueryBuilder};

/// Predicate builder for [`FilterKind::Custom`].
///
/// Pushes ` AND <predicate>` onto the builder and returns `true`, or leaves
/// the builder untouched and returns `false` when the value does not apply.
pub type FilterFn = fn(&mut QueryBuilder<'static, Postgres>, &FilterValue) -> bool;

/// How a registered filter turns a value into a predicate.
#[derive(Clone, Copy)]
pub enum FilterKind {
    /// `col = $v`, or `col = ANY($list)` for IN-lists.
    EqText(&'static str),
    /// Case-insensitive partial match.
    Like(&'static str),
    /// Integer equality; IN-lists become `= ANY`. Unparsable values are ignored.
    EqInt(&'static str),
    /// Boolean flag from `true/false/1/0`.
    Flag(&'static str),
    /// `{from, to}` on a timestamp column. Dates (`YYYY-MM-DD`) cover the whole day.
    DateRange(&'static str),
    Custom(FilterFn),
}

/// One entry of an entity's filter table.
#[derive(Clone, Copy)]
pub struct FilterDef {
    pub name: &'static str,
    pub kind: FilterKind,
}

impl FilterDef {
    pub const fn new(name: &'static str, kind: FilterKind) -> Self {
        Self { name, kind }
    }
}

#[derive(Clone, Copy)]
pub enum RelationKind {
    /// The owner row holds `foreign_key` pointing at the related `id`.
    BelongsTo { foreign_key: &'static str },
    /// Related rows hold `foreign_key` pointing at the owner `id`.
    HasMany { foreign_key: &'static str },
    /// Linked through a pivot table.
    BelongsToMany {
        pivot: &'static str,
        owner_key: &'static str,
        related_key: &'static str,
    },
}

/// An eager-loadable relation.
#[derive(Clone, Copy)]
pub struct RelationDef {
    pub name: &'static str,
    pub table: &'static str,
    /// Columns of `table` exposed in the loaded JSON.
    pub columns: &'static str,
    pub kind: RelationKind,
    /// Whether `table` has a `deleted_at` column to exclude trashed rows.
    pub soft_deletes: bool,
}

/// A persisted row type the generic repository can operate on.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + 'static {
    /// Human-readable name for errors and logs.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Comma-separated select list matching the struct fields.
    const COLUMNS: &'static str;
    const SEARCHABLE: &'static [&'static str] = &[];
    const SORTABLE: &'static [&'static str] = &["id"];
    const DEFAULT_SORT: (&'static str, SortDir) = ("id", SortDir::Desc);
    /// Table has a nullable `deleted_at` column.
    const SOFT_DELETES: bool = true;
    /// Table maintains `updated_at`.
    const TIMESTAMPS: bool = true;
    const UUID_COLUMN: Option<&'static str> = None;
    const ACTIVE_COLUMN: Option<&'static str> = None;
    /// Column used as the display label of select options.
    const LABEL_COLUMN: &'static str = "name";
    const FILTERS: &'static [FilterDef] = &[];
    const RELATIONS: &'static [RelationDef] = &[];
    /// Computed attributes resolvable through [`Entity::appended`].
    const APPENDS: &'static [&'static str] = &[];
    /// Default export projection (field, label). Empty means every column.
    const EXPORT_COLUMNS: &'static [(&'static str, &'static str)] = &[];
    const EXPORT_BASENAME: &'static str = Self::TABLE;

    fn id(&self) -> DbId;

    fn updated_at(&self) -> Option<Timestamp> {
        None
    }

    /// Value of a computed attribute listed in [`Entity::APPENDS`].
    fn appended(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Public representation of a single item.
    fn to_item(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Public representation of a listing row; same as the item by default.
    fn to_row(&self) -> Map<String, Value> {
        match self.to_item() {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

pub(crate) fn find_filter<E: Entity>(name: &str) -> Option<&'static FilterDef> {
    E::FILTERS.iter().find(|f| f.name == name)
}

pub(crate) fn find_relation<E: Entity>(name: &str) -> Option<&'static RelationDef> {
    E::RELATIONS.iter().find(|r| r.name == name)
}

/// Split [`Entity::COLUMNS`] into individual names.
pub fn column_names<E: Entity>() -> impl Iterator<Item = &'static str> {
    E::COLUMNS.split(',').map(str::trim).filter(|c| !c.is_empty())
}

/// An entity given either as an already-loaded row or by id.
pub enum Target<'a, E> {
    Id(DbId),
    Model(&'a E),
}

impl<E: Entity> Target<'_, E> {
    pub fn id(&self) -> DbId {
        match self {
            Target::Id(id) => *id,
            Target::Model(model) => model.id(),
        }
    }
}

impl<E> From<DbId> for Target<'_, E> {
    fn from(id: DbId) -> Self {
        Target::Id(id)
    }
}

impl<'a, E> From<&'a E> for Target<'a, E> {
    fn from(model: &'a E) -> Self {
        Target::Model(model)
    }
}
