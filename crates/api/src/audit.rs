//! Audit trail recording.
//!
//! Recording is best-effort: a failed insert is logged and never fails the
//! request that caused it.

use backoffice_core::types::DbId;
use backoffice_db::models::audit_log::CreateAuditLog;
use backoffice_db::repositories::AuditLogRepo;
use serde_json::Value;

use crate::middleware::auth::Actor;
use crate::state::AppState;

pub const EVENT_CREATED: &str = "created";
pub const EVENT_UPDATED: &str = "updated";
pub const EVENT_DELETED: &str = "deleted";
pub const EVENT_FORCE_DELETED: &str = "force_deleted";
pub const EVENT_RESTORED: &str = "restored";
pub const EVENT_ACTIVATED: &str = "activated";
pub const EVENT_DEACTIVATED: &str = "deactivated";
pub const EVENT_PERMISSIONS_SYNCED: &str = "permissions_synced";
pub const EVENT_LOGIN: &str = "login";
pub const EVENT_LOGIN_FAILED: &str = "login_failed";

/// One audit entry before it is attributed to a request.
#[derive(Debug, Default)]
pub struct Change {
    pub event: String,
    pub auditable_type: String,
    pub auditable_id: Option<DbId>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
}

impl Change {
    pub fn new(event: impl Into<String>, auditable_type: &str) -> Self {
        Self {
            event: event.into(),
            auditable_type: auditable_type.to_string(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: DbId) -> Self {
        self.auditable_id = Some(id);
        self
    }

    pub fn old(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

/// Record `change` as performed by `actor`.
pub async fn record(state: &AppState, actor: &Actor, change: Change) {
    record_raw(
        state,
        Some(actor.user.user_id),
        actor.ip_address.clone(),
        actor.user_agent.clone(),
        change,
    )
    .await;
}

/// Record `change` for a request that may not be authenticated (logins).
pub async fn record_raw(
    state: &AppState,
    user_id: Option<DbId>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    change: Change,
) {
    let entry = CreateAuditLog {
        user_id,
        event: change.event,
        auditable_type: change.auditable_type,
        auditable_id: change.auditable_id,
        old_values: change.old_values,
        new_values: change.new_values,
        ip_address,
        user_agent,
    };
    if let Err(err) = AuditLogRepo::create(&state.pool, &entry).await {
        tracing::warn!(
            event = %entry.event,
            auditable_type = %entry.auditable_type,
            error = %err,
            "Failed to record audit entry"
        );
    }
}
