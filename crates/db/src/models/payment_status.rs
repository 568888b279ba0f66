//! Payment status catalog.

use backoffice_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::entity::{Entity, FilterDef, FilterKind};
use crate::values::{changed, Fillable, SqlValue};

/// A row from the `payment_statuses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentStatus {
    pub id: DbId,
    pub code: String,
    pub name: String,
    /// Hex color used by badges, e.g. `#16a34a`.
    pub color: Option<String>,
    /// Terminal status: no further transitions expected.
    pub is_final: bool,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for PaymentStatus {
    const NAME: &'static str = "PaymentStatus";
    const TABLE: &'static str = "payment_statuses";
    const COLUMNS: &'static str = "\
        id, code, name, color, is_final, is_active, \
        created_at, updated_at, deleted_at";
    const SEARCHABLE: &'static [&'static str] = &["code", "name"];
    const SORTABLE: &'static [&'static str] =
        &["id", "code", "name", "is_final", "is_active", "created_at"];
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");
    const FILTERS: &'static [FilterDef] = &[
        FilterDef::new("id", FilterKind::EqInt("id")),
        FilterDef::new("code", FilterKind::EqText("code")),
        FilterDef::new("is_final", FilterKind::Flag("is_final")),
        FilterDef::new("is_active", FilterKind::Flag("is_active")),
        FilterDef::new("created_at", FilterKind::DateRange("created_at")),
    ];
    const EXPORT_COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("code", "Código"),
        ("name", "Nombre"),
        ("color", "Color"),
        ("is_final", "Final"),
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
pub struct CreatePaymentStatus {
    #[validate(length(min = 1, max = 30))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    pub is_final: Option<bool>,
    pub is_active: Option<bool>,
}

impl Fillable for CreatePaymentStatus {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("code", self.code.clone().into()),
            ("name", self.name.clone().into()),
            ("color", self.color.clone().into()),
            ("is_final", self.is_final.unwrap_or(false).into()),
            ("is_active", self.is_active.unwrap_or(true).into()),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePaymentStatus {
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    pub is_final: Option<bool>,
    pub is_active: Option<bool>,
}

impl Fillable for UpdatePaymentStatus {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        let mut attrs = Vec::new();
        changed(&mut attrs, "code", &self.code);
        changed(&mut attrs, "name", &self.name);
        changed(&mut attrs, "color", &self.color);
        changed(&mut attrs, "is_final", &self.is_final);
        changed(&mut attrs, "is_active", &self.is_active);
        attrs
    }
}
