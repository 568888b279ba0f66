use std::sync::Arc;

use backoffice_db::entity::Entity;
use backoffice_db::service::CrudService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the pool is reference-counted and the config sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: backoffice_db::DbPool,
    /// Server configuration (list limits, export labels, JWT settings).
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(pool: backoffice_db::DbPool, config: ServerConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// CRUD service for `E` using the configured export labels.
    pub fn service<E: Entity>(&self) -> CrudService<E> {
        CrudService::with_labels(self.pool.clone(), self.config.export_labels.clone())
    }
}
