use backoffice_core::export::BoolLabels;
use backoffice_core::list_query::{ListQueryConfig, DEFAULT_PER_PAGE, MAX_PER_PAGE};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Also bounds exports.
    pub request_timeout_secs: u64,
    /// Seconds to wait for in-flight requests after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Pool size (default: [`backoffice_db::DEFAULT_MAX_CONNECTIONS`]).
    pub db_max_connections: u32,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Page-size bounds for list endpoints.
    pub list: ListQueryConfig,
    /// How exports render boolean cells.
    pub export_labels: BoolLabels,
    /// Admin account created at startup when no user has its email yet.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Credentials for the first administrator.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                       |
    /// | `DB_MAX_CONNECTIONS`       | `20`                       |
    /// | `LIST_DEFAULT_PER_PAGE`    | `15`                       |
    /// | `LIST_MAX_PER_PAGE`        | `100`                      |
    /// | `EXPORT_ACTIVE_LABEL`      | `Activo`                   |
    /// | `EXPORT_INACTIVE_LABEL`    | `Inactivo`                 |
    /// | `BOOTSTRAP_ADMIN_EMAIL`    | unset (no bootstrap)       |
    /// | `BOOTSTRAP_ADMIN_PASSWORD` | unset (no bootstrap)       |
    /// | `BOOTSTRAP_ADMIN_NAME`     | `Administrator`            |
    ///
    /// # Panics
    ///
    /// Panics on unparsable numbers and on a missing `JWT_SECRET`, so a
    /// misconfigured server fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", 30);
        let db_max_connections: u32 =
            env_parse("DB_MAX_CONNECTIONS", backoffice_db::DEFAULT_MAX_CONNECTIONS);

        let list = ListQueryConfig {
            default_per_page: env_parse("LIST_DEFAULT_PER_PAGE", DEFAULT_PER_PAGE),
            max_per_page: env_parse("LIST_MAX_PER_PAGE", MAX_PER_PAGE),
        };

        let defaults = BoolLabels::default();
        let export_labels = BoolLabels {
            truthy: std::env::var("EXPORT_ACTIVE_LABEL").unwrap_or(defaults.truthy),
            falsy: std::env::var("EXPORT_INACTIVE_LABEL").unwrap_or(defaults.falsy),
        };

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_EMAIL"),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin {
                    name: std::env::var("BOOTSTRAP_ADMIN_NAME")
                        .unwrap_or_else(|_| "Administrator".into()),
                    email: email.trim().to_string(),
                    password,
                })
            }
            _ => None,
        };

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            db_max_connections,
            jwt,
            list,
            export_labels,
            bootstrap_admin,
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be valid: {e}")),
        Err(_) => default,
    }
}
