//! Role service - Handles role and grant management.

use async_trait::async_trait;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{CreateRole, NewRole, Permission, Role, UpdateRole};

use crate::cache::CacheScope;
use crate::repository::Repositories;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Role service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RoleService: Send + Sync {
    /// Create a role and grant its permissions in one transaction
    async fn create_role(&self, request: CreateRole) -> AppResult<Role>;

    async fn get_role(&self, id: Uuid) -> AppResult<Role>;

    async fn get_role_by_name(&self, name: &str) -> AppResult<Role>;

    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Apply field and grant changes in one transaction
    async fn update_role(&self, id: Uuid, request: UpdateRole) -> AppResult<Role>;

    async fn delete_role(&self, id: Uuid) -> AppResult<()>;

    async fn get_role_permissions(&self, id: Uuid) -> AppResult<Vec<Permission>>;

    async fn assign_permissions(&self, id: Uuid, permission_ids: Vec<Uuid>) -> AppResult<Role>;
}

pub struct RoleManager {
    repos: Repositories,
}

impl RoleManager {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Clear what a change to the role set or its grants can leave stale.
    async fn invalidate_roles(&self, grants_changed: bool) {
        let scopes: &[CacheScope] = if grants_changed {
            &[CacheScope::Roles, CacheScope::UserPermissions]
        } else {
            &[CacheScope::Roles]
        };
        self.repos.cache.invalidate(scopes).await;
    }
}

#[async_trait]
impl RoleService for RoleManager {
    async fn create_role(&self, request: CreateRole) -> AppResult<Role> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("role name is required"));
        }

        let new = NewRole {
            name,
            description: request.description,
        };
        let permission_ids = request.permission_ids;
        let grants_changed = !permission_ids.is_empty();

        let role = self
            .repos
            .tx
            .execute_tx(move |repo| {
                Box::pin(async move {
                    let role = repo.create_role(new).await?;
                    if !permission_ids.is_empty() {
                        repo.replace_role_permissions(role.id, permission_ids).await?;
                    }
                    Ok(role)
                })
            })
            .await?;
        self.invalidate_roles(grants_changed).await;

        tracing::info!(role_id = %role.id, name = %role.name, "Role created");
        self.get_role(role.id).await
    }

    async fn get_role(&self, id: Uuid) -> AppResult<Role> {
        self.repos.roles.find_by_id(id).await?.ok_or_not_found("role")
    }

    async fn get_role_by_name(&self, name: &str) -> AppResult<Role> {
        self.repos
            .roles
            .find_by_name(name)
            .await?
            .ok_or_not_found("role")
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.repos.roles.list().await
    }

    async fn update_role(&self, id: Uuid, request: UpdateRole) -> AppResult<Role> {
        let current = self.get_role(id).await?;
        let update = request.merge_into(&current);
        if update.name.trim().is_empty() {
            return Err(AppError::validation("role name is required"));
        }

        let permission_ids = request.permission_ids;
        let grants_changed = permission_ids.is_some();

        self.repos
            .tx
            .execute_tx(move |repo| {
                Box::pin(async move {
                    repo.update_role(id, update).await?;
                    if let Some(permission_ids) = permission_ids {
                        repo.replace_role_permissions(id, permission_ids).await?;
                    }
                    Ok(())
                })
            })
            .await?;
        self.invalidate_roles(grants_changed).await;

        self.get_role(id).await
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<()> {
        self.repos.roles.delete(id).await?;
        tracing::info!(role_id = %id, "Role deleted");
        Ok(())
    }

    async fn get_role_permissions(&self, id: Uuid) -> AppResult<Vec<Permission>> {
        self.get_role(id).await?;
        self.repos.roles.get_role_permissions(id).await
    }

    async fn assign_permissions(&self, id: Uuid, permission_ids: Vec<Uuid>) -> AppResult<Role> {
        self.get_role(id).await?;
        self.repos.roles.assign_permissions(id, permission_ids).await?;
        self.get_role(id).await
    }
}
