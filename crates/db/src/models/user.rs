//! User entity model and DTOs.

use backoffice_core::list_query::FilterValue;
use backoffice_core::types::{DbId, Timestamp};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::entity::{Entity, FilterDef, FilterKind, RelationDef, RelationKind};
use crate::values::{changed, Fillable, SqlValue};

/// Full user row from the `users` table.
///
/// The password hash is never serialized; API output goes through
/// [`Entity::to_item`] which relies on that.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub uuid: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: DbId,
    pub is_active: bool,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// `filters[role]=editor` or `filters[role][]=admin&filters[role][]=editor`.
fn role_name_filter(qb: &mut QueryBuilder<'static, Postgres>, value: &FilterValue) -> bool {
    match value {
        FilterValue::Scalar(name) => {
            qb.push(" AND role_id IN (SELECT id FROM roles WHERE name = ");
            qb.push_bind(name.clone());
            qb.push(")");
            true
        }
        FilterValue::List(names) => {
            qb.push(" AND role_id IN (SELECT id FROM roles WHERE name = ANY(");
            qb.push_bind(names.clone());
            qb.push("))");
            true
        }
        FilterValue::Range { .. } => false,
    }
}

impl Entity for User {
    const NAME: &'static str = "User";
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "\
        id, uuid, name, email, password_hash, role_id, is_active, last_login_at, \
        created_at, updated_at, deleted_at";
    const SEARCHABLE: &'static [&'static str] = &["name", "email"];
    const SORTABLE: &'static [&'static str] =
        &["id", "name", "email", "is_active", "last_login_at", "created_at"];
    const UUID_COLUMN: Option<&'static str> = Some("uuid");
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");
    const FILTERS: &'static [FilterDef] = &[
        FilterDef::new("id", FilterKind::EqInt("id")),
        FilterDef::new("role_id", FilterKind::EqInt("role_id")),
        FilterDef::new("role", FilterKind::Custom(role_name_filter)),
        FilterDef::new("email", FilterKind::Like("email")),
        FilterDef::new("is_active", FilterKind::Flag("is_active")),
        FilterDef::new("created_at", FilterKind::DateRange("created_at")),
    ];
    const RELATIONS: &'static [RelationDef] = &[RelationDef {
        name: "role",
        table: "roles",
        columns: "id, uuid, name",
        kind: RelationKind::BelongsTo {
            foreign_key: "role_id",
        },
        soft_deletes: false,
    }];
    const APPENDS: &'static [&'static str] = &["initials"];
    const EXPORT_COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("name", "Nombre"),
        ("email", "Correo"),
        ("is_active", "Activo"),
        ("last_login_at", "Último acceso"),
        ("created_at", "Creado"),
    ];

    fn id(&self) -> DbId {
        self.id
    }

    fn updated_at(&self) -> Option<Timestamp> {
        Some(self.updated_at)
    }

    fn appended(&self, name: &str) -> Option<Value> {
        match name {
            "initials" => Some(Value::String(initials(&self.name))),
            _ => None,
        }
    }
}

/// Up to two uppercase initials: `"ana maría soto"` -> `"AM"`.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

/// Insert DTO. The API layer hashes the password before building it.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: DbId,
    pub is_active: bool,
}

impl Fillable for CreateUser {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("name", self.name.clone().into()),
            ("email", self.email.to_lowercase().into()),
            ("password_hash", self.password_hash.clone().into()),
            ("role_id", self.role_id.into()),
            ("is_active", self.is_active.into()),
        ]
    }
}

/// Patch DTO. All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<DbId>,
    pub is_active: Option<bool>,
}

impl Fillable for UpdateUser {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        let mut attrs = Vec::new();
        changed(&mut attrs, "name", &self.name);
        changed(&mut attrs, "email", &self.email.as_deref().map(str::to_lowercase));
        changed(&mut attrs, "password_hash", &self.password_hash);
        changed(&mut attrs, "role_id", &self.role_id);
        changed(&mut attrs, "is_active", &self.is_active);
        attrs
    }
}
