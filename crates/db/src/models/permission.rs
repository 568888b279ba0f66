//! Permission names (`{resource}.{ability}`), seeded by migrations.

use backoffice_core::list_query::SortDir;
use backoffice_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::entity::{Entity, FilterDef, FilterKind};

/// A row from the `permissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Permission {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Entity for Permission {
    const NAME: &'static str = "Permission";
    const TABLE: &'static str = "permissions";
    const COLUMNS: &'static str = "id, name, description, created_at, updated_at";
    const SEARCHABLE: &'static [&'static str] = &["name", "description"];
    const SORTABLE: &'static [&'static str] = &["id", "name"];
    const DEFAULT_SORT: (&'static str, SortDir) = ("name", SortDir::Asc);
    const SOFT_DELETES: bool = false;
    const FILTERS: &'static [FilterDef] = &[
        FilterDef::new("id", FilterKind::EqInt("id")),
        FilterDef::new("name", FilterKind::Like("name")),
    ];

    fn id(&self) -> DbId {
        self.id
    }

    fn updated_at(&self) -> Option<Timestamp> {
        Some(self.updated_at)
    }
}
