//! Role repository over the document backend.

use async_trait::async_trait;
use bson::doc;
use mongodb::Database;
use uuid::Uuid;

use common::AppResult;
use domain::{NewRole, Permission, Role, RoleUpdate};

use super::{reads, writes, MongoTx};
use crate::repository::RoleRepository;
use crate::transaction::TransactionManager;

pub struct MongoRoleStore {
    db: Database,
    tx: TransactionManager<MongoTx>,
}

impl MongoRoleStore {
    pub fn new(db: Database, tx: TransactionManager<MongoTx>) -> Self {
        Self { db, tx }
    }
}

#[async_trait]
impl RoleRepository for MongoRoleStore {
    async fn create(&self, role: NewRole) -> AppResult<Role> {
        writes::insert_role(&self.db, None, role).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Role>> {
        reads::find_role(&self.db, doc! { "_id": id.to_string() }).await
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        reads::find_role(&self.db, doc! { "name": name }).await
    }

    async fn list(&self) -> AppResult<Vec<Role>> {
        let mut roles = reads::find_roles(&self.db, doc! {}).await?;
        reads::attach_permissions(&self.db, &mut roles).await?;
        Ok(roles)
    }

    async fn update(&self, id: Uuid, update: RoleUpdate) -> AppResult<()> {
        writes::update_role(&self.db, None, id, update).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.tx
            .execute_tx(move |repo| Box::pin(async move { repo.delete_role(id).await }))
            .await
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> AppResult<Vec<Permission>> {
        reads::permissions_for_role(&self.db, role_id).await
    }

    async fn assign_permissions(&self, role_id: Uuid, permission_ids: Vec<Uuid>) -> AppResult<()> {
        self.tx
            .execute_tx(move |repo| {
                Box::pin(async move { repo.replace_role_permissions(role_id, permission_ids).await })
            })
            .await
    }
}
