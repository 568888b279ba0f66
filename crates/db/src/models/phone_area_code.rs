//! Telephone area codes, addressable by uuid.

use backoffice_core::list_query::SortDir;
use backoffice_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::entity::{Entity, FilterDef, FilterKind};
use crate::values::{changed, Fillable, SqlValue};

/// A row from the `phone_area_codes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PhoneAreaCode {
    pub id: DbId,
    pub uuid: Uuid,
    /// Country calling code without the plus sign, e.g. `56`.
    pub country_code: String,
    pub area_code: String,
    pub region: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for PhoneAreaCode {
    const NAME: &'static str = "PhoneAreaCode";
    const TABLE: &'static str = "phone_area_codes";
    const COLUMNS: &'static str = "\
        id, uuid, country_code, area_code, region, is_active, \
        created_at, updated_at, deleted_at";
    const SEARCHABLE: &'static [&'static str] = &["country_code", "area_code", "region"];
    const SORTABLE: &'static [&'static str] =
        &["id", "country_code", "area_code", "region", "is_active", "created_at"];
    const DEFAULT_SORT: (&'static str, SortDir) = ("area_code", SortDir::Asc);
    const UUID_COLUMN: Option<&'static str> = Some("uuid");
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");
    const LABEL_COLUMN: &'static str = "region";
    const FILTERS: &'static [FilterDef] = &[
        FilterDef::new("id", FilterKind::EqInt("id")),
        FilterDef::new("country_code", FilterKind::EqText("country_code")),
        FilterDef::new("area_code", FilterKind::EqText("area_code")),
        FilterDef::new("region", FilterKind::Like("region")),
        FilterDef::new("is_active", FilterKind::Flag("is_active")),
    ];
    const EXPORT_COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("country_code", "Código país"),
        ("area_code", "Código de área"),
        ("region", "Región"),
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
pub struct CreatePhoneAreaCode {
    #[validate(length(min = 1, max = 5))]
    pub country_code: String,
    #[validate(length(min = 1, max = 10))]
    pub area_code: String,
    #[validate(length(min = 1, max = 100))]
    pub region: String,
    pub is_active: Option<bool>,
}

impl Fillable for CreatePhoneAreaCode {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("country_code", self.country_code.clone().into()),
            ("area_code", self.area_code.clone().into()),
            ("region", self.region.clone().into()),
            ("is_active", self.is_active.unwrap_or(true).into()),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePhoneAreaCode {
    #[validate(length(min = 1, max = 5))]
    pub country_code: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub area_code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub region: Option<String>,
    pub is_active: Option<bool>,
}

impl Fillable for UpdatePhoneAreaCode {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        let mut attrs = Vec::new();
        changed(&mut attrs, "country_code", &self.country_code);
        changed(&mut attrs, "area_code", &self.area_code);
        changed(&mut attrs, "region", &self.region);
        changed(&mut attrs, "is_active", &self.is_active);
        attrs
    }
}
