use backoffice_core::error::CoreError;

/// Error returned by repositories and services.
///
/// Domain failures (not found, stale write, business rules) stay typed in
/// [`CoreError`]; storage failures, including constraint violations, pass
/// through untouched as [`sqlx::Error`].
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
