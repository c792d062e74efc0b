//! Document-store transaction executor and scoped write repository.
//!
//! Multi-document transactions need a replica set or sharded cluster; against
//! a standalone server `start_transaction` fails and surfaces as a begin error.

use async_trait::async_trait;
use mongodb::{Client, ClientSession, Database};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{
    NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RoleUpdate, User,
    UserUpdate,
};

use super::writes;
use crate::transaction::{TransactionManager, TxExecutor, TxRepository};

/// A client session with a transaction started on it.
pub struct MongoTx {
    session: ClientSession,
    db: Database,
}

#[async_trait]
impl TxExecutor for MongoTx {
    async fn commit(mut self) -> AppResult<()> {
        self.session
            .commit_transaction()
            .await
            .map_err(AppError::document("commit"))
    }

    async fn rollback(mut self) -> AppResult<()> {
        self.session
            .abort_transaction()
            .await
            .map_err(AppError::document("rollback"))
    }
}

/// Scoped repository attaching the session to every write.
pub struct MongoTxRepository<'a> {
    session: &'a mut ClientSession,
    db: &'a Database,
}

impl<'a> MongoTxRepository<'a> {
    pub fn new(session: &'a mut ClientSession, db: &'a Database) -> Self {
        Self { session, db }
    }
}

fn scope(tx: &mut MongoTx) -> Box<dyn TxRepository + '_> {
    Box::new(MongoTxRepository::new(&mut tx.session, &tx.db))
}

/// Transaction manager opening one session per transaction.
pub fn transaction_manager(client: Client, db: Database) -> TransactionManager<MongoTx> {
    TransactionManager::new(
        move || {
            let client = client.clone();
            let db = db.clone();
            async move {
                let mut session = client
                    .start_session()
                    .await
                    .map_err(AppError::document("start session"))?;
                session
                    .start_transaction()
                    .await
                    .map_err(AppError::document("start transaction"))?;
                Ok(MongoTx { session, db })
            }
        },
        scope,
    )
}

#[async_trait]
impl TxRepository for MongoTxRepository<'_> {
    async fn create_user(&mut self, user: NewUser) -> AppResult<User> {
        writes::insert_user(self.db, Some(&mut *self.session), user).await
    }

    async fn update_user(&mut self, id: Uuid, update: UserUpdate) -> AppResult<()> {
        writes::update_user(self.db, Some(&mut *self.session), id, update).await
    }

    async fn update_user_password(&mut self, id: Uuid, password_hash: String) -> AppResult<()> {
        writes::update_user_password(self.db, Some(&mut *self.session), id, password_hash).await
    }

    async fn replace_user_roles(&mut self, user_id: Uuid, role_ids: Vec<Uuid>) -> AppResult<()> {
        writes::replace_user_roles(self.db, Some(&mut *self.session), user_id, role_ids).await
    }

    async fn create_role(&mut self, role: NewRole) -> AppResult<Role> {
        writes::insert_role(self.db, Some(&mut *self.session), role).await
    }

    async fn update_role(&mut self, id: Uuid, update: RoleUpdate) -> AppResult<()> {
        writes::update_role(self.db, Some(&mut *self.session), id, update).await
    }

    async fn replace_role_permissions(
        &mut self,
        role_id: Uuid,
        permission_ids: Vec<Uuid>,
    ) -> AppResult<()> {
        writes::replace_role_permissions(self.db, Some(&mut *self.session), role_id, permission_ids)
            .await
    }

    async fn create_permission(&mut self, permission: NewPermission) -> AppResult<Permission> {
        writes::insert_permission(self.db, Some(&mut *self.session), permission).await
    }

    async fn update_permission(&mut self, id: Uuid, update: PermissionUpdate) -> AppResult<()> {
        writes::update_permission(self.db, Some(&mut *self.session), id, update).await
    }

    async fn delete_user(&mut self, id: Uuid) -> AppResult<()> {
        writes::delete_user(self.db, &mut *self.session, id).await
    }

    async fn delete_role(&mut self, id: Uuid) -> AppResult<()> {
        writes::delete_role(self.db, &mut *self.session, id).await
    }

    async fn delete_permission(&mut self, id: Uuid) -> AppResult<()> {
        writes::delete_permission(self.db, &mut *self.session, id).await
    }
}
