//! Permission repository over the document backend.

use async_trait::async_trait;
use bson::doc;
use mongodb::Database;
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{NewPermission, Permission, PermissionUpdate};

use super::documents;
use super::{reads, writes, MongoTx};
use crate::repository::PermissionRepository;
use crate::transaction::TransactionManager;

pub struct MongoPermissionStore {
    db: Database,
    tx: TransactionManager<MongoTx>,
}

impl MongoPermissionStore {
    pub fn new(db: Database, tx: TransactionManager<MongoTx>) -> Self {
        Self { db, tx }
    }
}

#[async_trait]
impl PermissionRepository for MongoPermissionStore {
    async fn create(&self, permission: NewPermission) -> AppResult<Permission> {
        writes::insert_permission(&self.db, None, permission).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Permission>> {
        documents::permissions(&self.db)
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(AppError::document("find permission"))?
            .map(Permission::try_from)
            .transpose()
    }

    async fn find_by_resource_action(
        &self,
        resource: &str,
        action: &str,
    ) -> AppResult<Option<Permission>> {
        documents::permissions(&self.db)
            .find_one(doc! { "resource": resource, "action": action })
            .await
            .map_err(AppError::document("find permission"))?
            .map(Permission::try_from)
            .transpose()
    }

    async fn list(&self) -> AppResult<Vec<Permission>> {
        reads::find_permissions(&self.db, doc! {}, doc! { "resource": 1, "action": 1 }).await
    }

    async fn list_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>> {
        reads::find_permissions(&self.db, doc! { "resource": resource }, doc! { "action": 1 }).await
    }

    async fn update(&self, id: Uuid, update: PermissionUpdate) -> AppResult<()> {
        writes::update_permission(&self.db, None, id, update).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.tx
            .execute_tx(move |repo| Box::pin(async move { repo.delete_permission(id).await }))
            .await
    }
}
