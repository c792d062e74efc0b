//! User Service Library
//!
//! Users, roles and permissions over either a relational database or a
//! document store, with a shared cache-aside layer in front of both.
//! The binary in `main.rs` is a thin operations CLI over this crate.

pub mod cache;
pub mod config;
pub mod infra;
pub mod repository;
pub mod service;
pub mod transaction;

use tracing::info;

use common::{AppError, AppResult};

use crate::cache::Cache;
use crate::config::{BackendKind, UserServiceConfig};
use crate::infra::{connect_with_retry, seed_defaults, Database, DocumentStore, SeedReport};
use crate::repository::{Backend, Repositories, RepositoryFactory};
use crate::service::Services;

/// A fully wired process: backend, repositories and services.
#[derive(Clone)]
pub struct AppContext {
    pub backend: Backend,
    pub repositories: Repositories,
    pub services: Services,
}

/// Connect to the configured backend and cache and build the service graph.
///
/// Seeds the default catalogue when `seed_default_data` is set.
pub async fn bootstrap(config: &UserServiceConfig) -> AppResult<AppContext> {
    let backend = connect_backend(config).await?;
    let cache = Cache::connect(&config.cache).await;

    let repositories = RepositoryFactory::build(&backend, cache);
    if config.seed_default_data {
        seed_defaults(&repositories, config.admin_password.as_deref()).await?;
    }
    let services = Services::from_repositories(repositories.clone());

    info!(backend = backend.name(), "User service ready");
    Ok(AppContext {
        backend,
        repositories,
        services,
    })
}

/// Connect to the backend named by `DB_TYPE`, retrying with backoff.
///
/// The relational backend applies pending migrations; the document store
/// ensures its unique indexes.
pub async fn connect_backend(config: &UserServiceConfig) -> AppResult<Backend> {
    match config.backend {
        BackendKind::Postgres => {
            let database = connect_with_retry("postgres", &config.retry, || {
                Database::connect(&config.database)
            })
            .await?;
            info!("Connected to relational database");
            Ok(Backend::Relational(database))
        }
        BackendKind::MongoDb => {
            let store = connect_with_retry("mongodb", &config.retry, || {
                DocumentStore::connect(&config.document_store)
            })
            .await?;
            info!(database = %config.document_store.database, "Connected to document store");
            Ok(Backend::Document(store))
        }
    }
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(config: &UserServiceConfig, action: MigrateAction) -> AppResult<()> {
    if config.backend != BackendKind::Postgres {
        return Err(AppError::validation(
            "migrations apply to the relational backend only",
        ));
    }

    let db = connect_with_retry("postgres", &config.retry, || {
        Database::connect_without_migrations(&config.database)
    })
    .await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations()
                .await
                .map_err(AppError::db("run migrations"))?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migrations(1)
                .await
                .map_err(AppError::db("rollback migration"))?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db
                .migration_status()
                .await
                .map_err(AppError::db("migration status"))?;
            for migration in status {
                let marker = if migration.applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, migration.name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations()
                .await
                .map_err(AppError::db("fresh migrations"))?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Seed default roles, permissions and (with a password) the admin account.
pub async fn seed(config: &UserServiceConfig) -> AppResult<SeedReport> {
    let backend = connect_backend(config).await?;
    let cache = Cache::connect(&config.cache).await;
    let repositories = RepositoryFactory::build(&backend, cache);

    seed_defaults(&repositories, config.admin_password.as_deref()).await
}

/// Result of a connectivity check.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub backend: &'static str,
    pub cache_enabled: bool,
}

/// Verify the backend answers a ping and report whether the cache is live.
pub async fn check(config: &UserServiceConfig) -> AppResult<HealthReport> {
    let backend = connect_backend(config).await?;
    match &backend {
        Backend::Relational(db) => db.ping().await.map_err(AppError::db("ping"))?,
        Backend::Document(store) => store.ping().await.map_err(AppError::document("ping"))?,
    }

    let cache = Cache::connect(&config.cache).await;
    Ok(HealthReport {
        backend: backend.name(),
        cache_enabled: cache.is_enabled(),
    })
}
