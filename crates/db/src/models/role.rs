//! Role entity model and DTOs.

use backoffice_core::list_query::SortDir;
use backoffice_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::entity::{Entity, FilterDef, FilterKind, RelationDef, RelationKind};
use crate::values::{changed, Fillable, SqlValue};

/// A role row from the `roles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: DbId,
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for Role {
    const NAME: &'static str = "Role";
    const TABLE: &'static str = "roles";
    const COLUMNS: &'static str = "\
        id, uuid, name, description, is_active, created_at, updated_at, deleted_at";
    const SEARCHABLE: &'static [&'static str] = &["name", "description"];
    const SORTABLE: &'static [&'static str] = &["id", "name", "is_active", "created_at"];
    const DEFAULT_SORT: (&'static str, SortDir) = ("name", SortDir::Asc);
    const UUID_COLUMN: Option<&'static str> = Some("uuid");
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");
    const FILTERS: &'static [FilterDef] = &[
        FilterDef::new("id", FilterKind::EqInt("id")),
        FilterDef::new("name", FilterKind::EqText("name")),
        FilterDef::new("is_active", FilterKind::Flag("is_active")),
    ];
    const RELATIONS: &'static [RelationDef] = &[
        RelationDef {
            name: "permissions",
            table: "permissions",
            columns: "id, name, description",
            kind: RelationKind::BelongsToMany {
                pivot: "role_permissions",
                owner_key: "role_id",
                related_key: "permission_id",
            },
            soft_deletes: false,
        },
        RelationDef {
            name: "users",
            table: "users",
            columns: "id, uuid, name, email, is_active",
            kind: RelationKind::HasMany {
                foreign_key: "role_id",
            },
            soft_deletes: true,
        },
    ];
    const EXPORT_COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("name", "Nombre"),
        ("description", "Descripción"),
        ("is_active", "Activo"),
    ];

    fn id(&self) -> DbId {
        self.id
    }

    fn updated_at(&self) -> Option<Timestamp> {
        Some(self.updated_at)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRole {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl Fillable for CreateRole {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("name", self.name.clone().into()),
            ("description", self.description.clone().into()),
            ("is_active", self.is_active.unwrap_or(true).into()),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRole {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl Fillable for UpdateRole {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        let mut attrs = Vec::new();
        changed(&mut attrs, "name", &self.name);
        changed(&mut attrs, "description", &self.description);
        changed(&mut attrs, "is_active", &self.is_active);
        attrs
    }
}
