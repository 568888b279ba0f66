use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Raised by the `*_or_fail*` lookups. `key` is the id or uuid that missed.
    #[error("Entity not found: {entity} with key {key}")]
    NotFound { entity: &'static str, key: String },

    /// Optimistic-lock mismatch: the caller's `expected_updated_at` is older
    /// than the stored row.
    #[error("Stale write: {entity} with id {id} was modified by another request")]
    StaleWrite { entity: &'static str, id: DbId },

    /// A business rule blocked the operation (e.g. deleting a protected record).
    #[error("{0}")]
    Domain(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Not-found error keyed by a numeric id.
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        CoreError::NotFound {
            entity,
            key: id.to_string(),
        }
    }

    /// Not-found error keyed by a uuid.
    pub fn not_found_uuid(entity: &'static str, uuid: uuid::Uuid) -> Self {
        CoreError::NotFound {
            entity,
            key: uuid.to_string(),
        }
    }
}
