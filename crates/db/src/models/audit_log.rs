//! Append-only audit trail of mutations made through the API.

use backoffice_core::types::{DbId, Timestamp};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use crate::entity::{Entity, FilterDef, FilterKind, RelationDef, RelationKind};
use crate::values::{Fillable, SqlValue};

/// A row from the `audit_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: DbId,
    /// `None` for unauthenticated events (failed logins).
    pub user_id: Option<DbId>,
    /// `created`, `updated`, `deleted`, `restored`, ...
    pub event: String,
    /// Resource name, e.g. `document_types`.
    pub auditable_type: String,
    pub auditable_id: Option<DbId>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
}

impl Entity for AuditLog {
    const NAME: &'static str = "AuditLog";
    const TABLE: &'static str = "audit_logs";
    const COLUMNS: &'static str = "\
        id, user_id, event, auditable_type, auditable_id, \
        old_values, new_values, ip_address, user_agent, created_at";
    const SEARCHABLE: &'static [&'static str] = &["event", "auditable_type", "ip_address"];
    const SORTABLE: &'static [&'static str] = &["id", "event", "auditable_type", "created_at"];
    const SOFT_DELETES: bool = false;
    const TIMESTAMPS: bool = false;
    const LABEL_COLUMN: &'static str = "event";
    const FILTERS: &'static [FilterDef] = &[
        FilterDef::new("user_id", FilterKind::EqInt("user_id")),
        FilterDef::new("event", FilterKind::EqText("event")),
        FilterDef::new("auditable_type", FilterKind::EqText("auditable_type")),
        FilterDef::new("auditable_id", FilterKind::EqInt("auditable_id")),
        FilterDef::new("created_at", FilterKind::DateRange("created_at")),
    ];
    const RELATIONS: &'static [RelationDef] = &[RelationDef {
        name: "user",
        table: "users",
        columns: "id, uuid, name, email",
        kind: RelationKind::BelongsTo {
            foreign_key: "user_id",
        },
        soft_deletes: false,
    }];

    fn id(&self) -> DbId {
        self.id
    }
}

/// Insert DTO for one audit entry.
#[derive(Debug, Clone, Default)]
pub struct CreateAuditLog {
    pub user_id: Option<DbId>,
    pub event: String,
    pub auditable_type: String,
    pub auditable_id: Option<DbId>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Fillable for CreateAuditLog {
    fn attributes(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("user_id", self.user_id.into()),
            ("event", self.event.clone().into()),
            ("auditable_type", self.auditable_type.clone().into()),
            ("auditable_id", self.auditable_id.into()),
            ("old_values", self.old_values.clone().into()),
            ("new_values", self.new_values.clone().into()),
            ("ip_address", self.ip_address.clone().into()),
            ("user_agent", self.user_agent.clone().into()),
        ]
    }
}
