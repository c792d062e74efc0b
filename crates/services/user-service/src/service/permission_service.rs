//! Permission service - Handles the permission catalogue.

use async_trait::async_trait;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{CreatePermission, NewPermission, Permission, UpdatePermission};

use crate::cache::CacheScope;
use crate::repository::Repositories;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Permission service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PermissionService: Send + Sync {
    async fn create_permission(&self, request: CreatePermission) -> AppResult<Permission>;

    async fn get_permission(&self, id: Uuid) -> AppResult<Permission>;

    async fn get_by_resource_action(&self, resource: &str, action: &str) -> AppResult<Permission>;

    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;

    async fn list_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>>;

    async fn update_permission(&self, id: Uuid, request: UpdatePermission) -> AppResult<Permission>;

    /// Delete a permission, revoking it from every role that held it
    async fn delete_permission(&self, id: Uuid) -> AppResult<()>;
}

pub struct PermissionManager {
    repos: Repositories,
}

impl PermissionManager {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }
}

fn validate_pair(resource: &str, action: &str) -> AppResult<()> {
    if resource.trim().is_empty() || action.trim().is_empty() {
        return Err(AppError::validation("resource and action are required"));
    }
    Ok(())
}

#[async_trait]
impl PermissionService for PermissionManager {
    async fn create_permission(&self, request: CreatePermission) -> AppResult<Permission> {
        validate_pair(&request.resource, &request.action)?;
        let new = NewPermission::from(request);

        let permission = self
            .repos
            .tx
            .execute_tx(move |repo| Box::pin(async move { repo.create_permission(new).await }))
            .await?;
        self.repos
            .cache
            .invalidate(CacheScope::PERMISSION_GRAPH)
            .await;

        tracing::info!(permission_id = %permission.id, name = %permission.name, "Permission created");
        Ok(permission)
    }

    async fn get_permission(&self, id: Uuid) -> AppResult<Permission> {
        self.repos
            .permissions
            .find_by_id(id)
            .await?
            .ok_or_not_found("permission")
    }

    async fn get_by_resource_action(&self, resource: &str, action: &str) -> AppResult<Permission> {
        self.repos
            .permissions
            .find_by_resource_action(resource, action)
            .await?
            .ok_or_not_found("permission")
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        self.repos.permissions.list().await
    }

    async fn list_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>> {
        self.repos.permissions.list_by_resource(resource).await
    }

    async fn update_permission(&self, id: Uuid, request: UpdatePermission) -> AppResult<Permission> {
        let current = self.get_permission(id).await?;
        let update = request.merge_into(&current);
        validate_pair(&update.resource, &update.action)?;

        self.repos.permissions.update(id, update).await?;
        self.get_permission(id).await
    }

    async fn delete_permission(&self, id: Uuid) -> AppResult<()> {
        self.repos.permissions.delete(id).await?;
        tracing::info!(permission_id = %id, "Permission deleted");
        Ok(())
    }
}
