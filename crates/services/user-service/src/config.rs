//! User service configuration.

use std::env;
use std::str::FromStr;

use common::{
    AppError, AppResult, CacheConfig, DatabaseConfig, DocumentStoreConfig, RetryConfig,
};

/// Which persistence backend the process wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Postgres,
    MongoDb,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "mongodb" | "mongo" => Ok(BackendKind::MongoDb),
            other => Err(AppError::validation(format!(
                "unsupported DB_TYPE {other:?}, expected postgres or mongodb"
            ))),
        }
    }
}

/// User service configuration.
#[derive(Debug, Clone)]
pub struct UserServiceConfig {
    pub backend: BackendKind,
    pub database: DatabaseConfig,
    pub document_store: DocumentStoreConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    /// Seed default roles and permissions at bootstrap
    pub seed_default_data: bool,
    /// Password for the seeded `admin` account; no account without it
    pub admin_password: Option<String>,
}

/// First set variable among `names`.
fn var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env::var(name).ok())
}

fn parsed<T: FromStr>(names: &[&str], default: T) -> AppResult<T> {
    match var(names) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::validation(format!("invalid value {raw:?} for {}", names[0]))),
    }
}

impl UserServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let backend = match var(&["DB_TYPE"]) {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };

        let database = DatabaseConfig {
            url: var(&["USER_SERVICE_DATABASE_URL", "DATABASE_URL"])
                .unwrap_or(defaults.database.url),
            max_connections: parsed(
                &["DATABASE_MAX_CONNECTIONS"],
                defaults.database.max_connections,
            )?,
            min_connections: parsed(
                &["DATABASE_MIN_CONNECTIONS"],
                defaults.database.min_connections,
            )?,
        };

        let document_store = DocumentStoreConfig {
            uri: var(&["MONGODB_URI"]).unwrap_or(defaults.document_store.uri),
            database: var(&["MONGODB_DATABASE"]).unwrap_or(defaults.document_store.database),
        };

        let cache = CacheConfig {
            url: var(&["USER_SERVICE_REDIS_URL", "REDIS_URL"]).unwrap_or(defaults.cache.url),
            default_ttl_seconds: parsed(&["REDIS_CACHE_TTL"], defaults.cache.default_ttl_seconds)?,
            enabled: parsed(&["CACHE_ENABLED"], defaults.cache.enabled)?,
            connect_timeout_ms: parsed(
                &["CACHE_CONNECT_TIMEOUT_MS"],
                defaults.cache.connect_timeout_ms,
            )?,
            op_timeout_ms: parsed(&["CACHE_OP_TIMEOUT_MS"], defaults.cache.op_timeout_ms)?,
        };

        let retry = RetryConfig {
            max_attempts: parsed(&["CONNECT_MAX_ATTEMPTS"], defaults.retry.max_attempts)?,
            ..defaults.retry
        };

        Ok(Self {
            backend,
            database,
            document_store,
            cache,
            retry,
            seed_default_data: parsed(&["SEED_DEFAULT_DATA"], defaults.seed_default_data)?,
            admin_password: var(&["ADMIN_PASSWORD"]).filter(|p| !p.is_empty()),
        })
    }
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database: DatabaseConfig::default(),
            document_store: DocumentStoreConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            seed_default_data: false,
            admin_password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("postgres".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!(" MongoDB ".parse::<BackendKind>().unwrap(), BackendKind::MongoDb);

        let err = "oracle".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_defaults() {
        let config = UserServiceConfig::default();

        assert_eq!(config.backend, BackendKind::Postgres);
        assert_eq!(config.cache.default_ttl_seconds, 3600);
        assert!(config.cache.enabled);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.admin_password.is_none());
    }
}
