//! Transactions spanning several writes.
//!
//! A backend supplies an executor (one open transaction) and a scoped write
//! repository bound to it. [`TransactionManager`] drives either backend with
//! the same begin / callback / commit-or-rollback logic, and [`TxManager`] is
//! the handle services hold once the backend has been chosen at startup.

mod manager;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::AppResult;
use domain::{
    NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RoleUpdate, User,
    UserUpdate,
};

use crate::repository::mongo::MongoTx;
use crate::repository::sql::SqlTx;

pub use manager::{BeginFn, ScopeFn, TransactionManager};

/// One in-flight unit of work against a backend.
///
/// Consumed by exactly one of `commit` or `rollback`.
#[async_trait]
pub trait TxExecutor: Send + 'static {
    async fn commit(self) -> AppResult<()>;

    async fn rollback(self) -> AppResult<()>;
}

/// Mutating operations that must run inside a transaction.
///
/// Association replacement deletes every existing row for the parent and then
/// inserts one row per id; an empty list leaves the parent with none.
#[async_trait]
pub trait TxRepository: Send {
    /// Insert a user; the store assigns id and timestamps
    async fn create_user(&mut self, user: NewUser) -> AppResult<User>;

    async fn update_user(&mut self, id: Uuid, update: UserUpdate) -> AppResult<()>;

    async fn update_user_password(&mut self, id: Uuid, password_hash: String) -> AppResult<()>;

    async fn replace_user_roles(&mut self, user_id: Uuid, role_ids: Vec<Uuid>) -> AppResult<()>;

    async fn create_role(&mut self, role: NewRole) -> AppResult<Role>;

    async fn update_role(&mut self, id: Uuid, update: RoleUpdate) -> AppResult<()>;

    async fn replace_role_permissions(
        &mut self,
        role_id: Uuid,
        permission_ids: Vec<Uuid>,
    ) -> AppResult<()>;

    async fn create_permission(&mut self, permission: NewPermission) -> AppResult<Permission>;

    async fn update_permission(&mut self, id: Uuid, update: PermissionUpdate) -> AppResult<()>;

    /// Delete a user together with its role links
    async fn delete_user(&mut self, id: Uuid) -> AppResult<()>;

    /// Delete a role together with its user and permission links
    async fn delete_role(&mut self, id: Uuid) -> AppResult<()>;

    /// Delete a permission together with every grant of it
    async fn delete_permission(&mut self, id: Uuid) -> AppResult<()>;
}

/// Transaction manager bound to the backend selected at startup.
#[derive(Clone)]
pub enum TxManager {
    Relational(Arc<TransactionManager<SqlTx>>),
    Document(Arc<TransactionManager<MongoTx>>),
}

impl TxManager {
    /// Run `f` atomically; see [`TransactionManager::execute_tx`].
    pub async fn execute_tx<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send,
        F: for<'r> FnOnce(&'r mut dyn TxRepository) -> BoxFuture<'r, AppResult<T>> + Send,
    {
        match self {
            TxManager::Relational(manager) => manager.execute_tx(f).await,
            TxManager::Document(manager) => manager.execute_tx(f).await,
        }
    }

    /// Run `f` atomically, rolling back if `token` is cancelled first.
    pub async fn execute_tx_cancellable<T, F>(&self, token: &CancellationToken, f: F) -> AppResult<T>
    where
        T: Send,
        F: for<'r> FnOnce(&'r mut dyn TxRepository) -> BoxFuture<'r, AppResult<T>> + Send,
    {
        match self {
            TxManager::Relational(manager) => manager.execute_tx_cancellable(token, f).await,
            TxManager::Document(manager) => manager.execute_tx_cancellable(token, f).await,
        }
    }
}

/// Run a block inside a transaction with the scoped repository bound to `$repo`.
///
/// ```ignore
/// let user = with_transaction!(tx, |repo| {
///     let user = repo.create_user(new_user).await?;
///     repo.replace_user_roles(user.id, role_ids).await?;
///     Ok(user)
/// })?;
/// ```
#[macro_export]
macro_rules! with_transaction {
    ($tx:expr, |$repo:ident| $body:expr) => {
        $tx.execute_tx(move |$repo| Box::pin(async move { $body }))
            .await
    };
}
