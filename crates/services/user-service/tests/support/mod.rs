//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use sea_orm::{ConnectOptions, Database as SeaDatabase};

use domain::{CreateUser, NewPermission, NewRole, NewUser, UserUpdate};
use user_service_lib::cache::Cache;
use user_service_lib::infra::{Database, DocumentStore};
use user_service_lib::repository::{Backend, Repositories, RepositoryFactory};
use user_service_lib::service::Services;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Repositories over a migrated in-memory SQLite database and a memory cache.
///
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn sqlite_repositories() -> Repositories {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let connection = SeaDatabase::connect(options)
        .await
        .expect("open in-memory sqlite");
    let database = Database::from_connection(connection);
    database.run_migrations().await.expect("apply migrations");

    RepositoryFactory::build(
        &Backend::Relational(database),
        Cache::in_memory(Duration::from_secs(60)),
    )
}

pub async fn sqlite_services() -> (Repositories, Services) {
    let repos = sqlite_repositories().await;
    let services = Services::from_repositories(repos.clone());
    (repos, services)
}

/// Repositories over the replica set named by `MONGODB_TEST_URI`, if any.
///
/// Each call uses a fresh database so tests do not see each other's data.
pub async fn mongo_repositories() -> Option<Repositories> {
    let uri = std::env::var("MONGODB_TEST_URI").ok()?;
    let config = common::DocumentStoreConfig {
        uri,
        database: format!("user_service_test_{}", uuid::Uuid::new_v4().simple()),
    };
    let store = DocumentStore::connect(&config)
        .await
        .expect("connect to MONGODB_TEST_URI");

    Some(RepositoryFactory::build(
        &Backend::Document(store),
        Cache::in_memory(Duration::from_secs(60)),
    ))
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: "not-a-real-hash".to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        is_active: true,
    }
}

pub fn create_user(username: &str, role_ids: Vec<uuid::Uuid>) -> CreateUser {
    CreateUser {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: TEST_PASSWORD.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        role_ids,
    }
}

pub fn user_update(username: &str) -> UserUpdate {
    UserUpdate {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: "Updated".to_string(),
        last_name: "User".to_string(),
        is_active: true,
    }
}

pub fn new_role(name: &str) -> NewRole {
    NewRole {
        name: name.to_string(),
        description: format!("{} role", name),
    }
}

pub fn new_permission(resource: &str, action: &str) -> NewPermission {
    NewPermission::for_pair(resource, action, "")
}
