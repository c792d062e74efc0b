//! Repository wiring for the backend selected at startup.

use std::sync::Arc;

use crate::cache::Cache;
use crate::infra::{Database, DocumentStore};
use crate::repository::mongo::{self, MongoPermissionStore, MongoRoleStore, MongoUserStore};
use crate::repository::sql::{self, SqlPermissionStore, SqlRoleStore, SqlUserStore};
use crate::repository::{
    CachedPermissionRepository, CachedRoleRepository, CachedUserRepository, PermissionRepository,
    RoleRepository, UserRepository,
};
use crate::transaction::TxManager;

/// The one persistence backend this process talks to.
#[derive(Clone)]
pub enum Backend {
    Relational(Database),
    Document(DocumentStore),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Relational(_) => "postgres",
            Backend::Document(_) => "mongodb",
        }
    }
}

/// Everything services need from the persistence layer.
///
/// Consumers only see the traits and [`TxManager`]; which backend sits
/// behind them was decided once, when the factory ran.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub tx: TxManager,
    pub cache: Cache,
}

pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Build cache-aside repositories and the transaction manager over `backend`.
    pub fn build(backend: &Backend, cache: Cache) -> Repositories {
        let (users, roles, permissions, tx): (
            Arc<dyn UserRepository>,
            Arc<dyn RoleRepository>,
            Arc<dyn PermissionRepository>,
            TxManager,
        ) = match backend {
            Backend::Relational(database) => {
                let db = database.get_connection();
                let manager = sql::transaction_manager(db.clone());
                (
                    Arc::new(SqlUserStore::new(db.clone(), manager.clone())),
                    Arc::new(SqlRoleStore::new(db.clone(), manager.clone())),
                    Arc::new(SqlPermissionStore::new(db)),
                    TxManager::Relational(Arc::new(manager)),
                )
            }
            Backend::Document(store) => {
                let db = store.database();
                let manager = mongo::transaction_manager(store.client(), db.clone());
                (
                    Arc::new(MongoUserStore::new(db.clone(), manager.clone())),
                    Arc::new(MongoRoleStore::new(db.clone(), manager.clone())),
                    Arc::new(MongoPermissionStore::new(db, manager.clone())),
                    TxManager::Document(Arc::new(manager)),
                )
            }
        };

        tracing::info!(
            backend = backend.name(),
            cache_enabled = cache.is_enabled(),
            "Repositories initialized"
        );

        Repositories {
            users: Arc::new(CachedUserRepository::new(users, cache.clone())),
            roles: Arc::new(CachedRoleRepository::new(roles, cache.clone())),
            permissions: Arc::new(CachedPermissionRepository::new(permissions, cache.clone())),
            tx,
            cache,
        }
    }
}
