//! Relational transaction executor and scoped write repository.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{
    NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RoleUpdate, User,
    UserUpdate,
};

use super::writes;
use crate::transaction::{TransactionManager, TxExecutor, TxRepository};

/// Native sea-orm transaction. Dropped without commit it rolls back.
pub struct SqlTx(DatabaseTransaction);

#[async_trait]
impl TxExecutor for SqlTx {
    async fn commit(self) -> AppResult<()> {
        self.0.commit().await.map_err(AppError::db("commit"))
    }

    async fn rollback(self) -> AppResult<()> {
        self.0.rollback().await.map_err(AppError::db("rollback"))
    }
}

/// Scoped repository issuing every statement on the open transaction.
pub struct SqlTxRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> SqlTxRepository<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }
}

fn scope(tx: &mut SqlTx) -> Box<dyn TxRepository + '_> {
    Box::new(SqlTxRepository::new(&tx.0))
}

/// Transaction manager opening transactions from the shared pool.
pub fn transaction_manager(db: DatabaseConnection) -> TransactionManager<SqlTx> {
    TransactionManager::new(
        move || {
            let db = db.clone();
            async move {
                db.begin()
                    .await
                    .map(SqlTx)
                    .map_err(AppError::db("begin transaction"))
            }
        },
        scope,
    )
}

#[async_trait]
impl TxRepository for SqlTxRepository<'_> {
    async fn create_user(&mut self, user: NewUser) -> AppResult<User> {
        writes::insert_user(self.txn, user).await
    }

    async fn update_user(&mut self, id: Uuid, update: UserUpdate) -> AppResult<()> {
        writes::update_user(self.txn, id, update).await
    }

    async fn update_user_password(&mut self, id: Uuid, password_hash: String) -> AppResult<()> {
        writes::update_user_password(self.txn, id, password_hash).await
    }

    async fn replace_user_roles(&mut self, user_id: Uuid, role_ids: Vec<Uuid>) -> AppResult<()> {
        writes::replace_user_roles(self.txn, user_id, role_ids).await
    }

    async fn create_role(&mut self, role: NewRole) -> AppResult<Role> {
        writes::insert_role(self.txn, role).await
    }

    async fn update_role(&mut self, id: Uuid, update: RoleUpdate) -> AppResult<()> {
        writes::update_role(self.txn, id, update).await
    }

    async fn replace_role_permissions(
        &mut self,
        role_id: Uuid,
        permission_ids: Vec<Uuid>,
    ) -> AppResult<()> {
        writes::replace_role_permissions(self.txn, role_id, permission_ids).await
    }

    async fn create_permission(&mut self, permission: NewPermission) -> AppResult<Permission> {
        writes::insert_permission(self.txn, permission).await
    }

    async fn update_permission(&mut self, id: Uuid, update: PermissionUpdate) -> AppResult<()> {
        writes::update_permission(self.txn, id, update).await
    }

    async fn delete_user(&mut self, id: Uuid) -> AppResult<()> {
        writes::delete_user(self.txn, id).await
    }

    async fn delete_role(&mut self, id: Uuid) -> AppResult<()> {
        writes::delete_role(self.txn, id).await
    }

    async fn delete_permission(&mut self, id: Uuid) -> AppResult<()> {
        writes::delete_permission(self.txn, id).await
    }
}
