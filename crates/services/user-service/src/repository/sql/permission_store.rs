//! Permission repository over the relational backend.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{NewPermission, Permission, PermissionUpdate};

use super::writes;
use crate::repository::entities::permission;
use crate::repository::PermissionRepository;

pub struct SqlPermissionStore {
    db: DatabaseConnection,
}

impl SqlPermissionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionRepository for SqlPermissionStore {
    async fn create(&self, permission: NewPermission) -> AppResult<Permission> {
        writes::insert_permission(&self.db, permission).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Permission>> {
        let model = permission::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::db("find permission"))?;

        Ok(model.map(Permission::from))
    }

    async fn find_by_resource_action(
        &self,
        resource: &str,
        action: &str,
    ) -> AppResult<Option<Permission>> {
        let model = permission::Entity::find()
            .filter(permission::Column::Resource.eq(resource))
            .filter(permission::Column::Action.eq(action))
            .one(&self.db)
            .await
            .map_err(AppError::db("find permission"))?;

        Ok(model.map(Permission::from))
    }

    async fn list(&self) -> AppResult<Vec<Permission>> {
        let models = permission::Entity::find()
            .order_by_asc(permission::Column::Resource)
            .order_by_asc(permission::Column::Action)
            .all(&self.db)
            .await
            .map_err(AppError::db("list permissions"))?;

        Ok(models.into_iter().map(Permission::from).collect())
    }

    async fn list_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>> {
        let models = permission::Entity::find()
            .filter(permission::Column::Resource.eq(resource))
            .order_by_asc(permission::Column::Action)
            .all(&self.db)
            .await
            .map_err(AppError::db("list permissions by resource"))?;

        Ok(models.into_iter().map(Permission::from).collect())
    }

    async fn update(&self, id: Uuid, update: PermissionUpdate) -> AppResult<()> {
        writes::update_permission(&self.db, id, update).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        // role_permissions rows go with it through ON DELETE CASCADE
        writes::delete_permission(&self.db, id).await
    }
}
