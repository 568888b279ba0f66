//! Identity document types (cédula, pasaporte, ...).

use backoffice_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

use crate::entity::{Entity, FilterDef, FilterKind};
use crate::values::{changed, Fillable, SqlValue};

/// A row from the `document_types` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentType {
    pub id: DbId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for DocumentType {
    const NAME: &'static str = "DocumentType";
    const TABLE: &'static str = "document_types";
    const COLUMNS: &'static str = "\
        id, code, name, description, is_active, sort_order, \
        created_at, updated_at, deleted_at";
    const SEARCHABLE: &'static [&'static str] = &["code", "name", "description"];
    const SORTABLE: &'static [&'static str] = &[
        "id",
        "code",
        "name",
        "sort_order",
        "is_active",
        "created_at",
        "updated_at",
    ];
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");
    const FILTERS: &'static [FilterDef] = &[
        FilterDef::new("id", FilterKind::EqInt("id")),
        FilterDef::new("code", FilterKind::EqText("code")),
        FilterDef::new("name", FilterKind::Like("name")),
        FilterDef::new("is_active", FilterKind::Flag("is_active")),
        FilterDef::new("created_at", FilterKind::DateRange("created_at")),
    ];
    const APPENDS: &'static [&'static str] = &["label"];
    const EXPORT_COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("code", "Código"),
        ("name", "Nombre"),
        ("description", "Descripción"),
        ("is_active", "Activo"),
        ("sort_order", "Orden"),
    ];

    fn id(&self) -> DbId {
        self.id
    }

    fn updated_at(&self) -> Option<Timestamp> {
        Some(self.updated_at)
    }

    fn appended(&self, name: &str) -> Option<Value> {
        match name {
            "label" => Some(Value::String(format!("{} - {}", self.code, self.name))),
            _ => None,
        }
    }
}

/// DTO for creating a document type.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDocumentType {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    /// Defaults to `true`.
    pub is_active: Option<bool>,
    /// Defaults to `0`.
    pub sort_order: Option<i32>,
}

impl Fillable for CreateDocumentType {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("code", self.code.clone().into()),
            ("name", self.name.clone().into()),
            ("description", self.description.clone().into()),
            ("is_active", self.is_active.unwrap_or(true).into()),
            ("sort_order", self.sort_order.unwrap_or(0).into()),
        ]
    }
}

/// DTO for updating a document type. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateDocumentType {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl Fillable for UpdateDocumentType {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        let mut attrs = Vec::new();
        changed(&mut attrs, "code", &self.code);
        changed(&mut attrs, "name", &self.name);
        changed(&mut attrs, "description", &self.description);
        changed(&mut attrs, "is_active", &self.is_active);
        changed(&mut attrs, "sort_order", &self.sort_order);
        attrs
    }
}
