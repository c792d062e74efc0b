//! Cached role repository decorator.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use uuid::Uuid;

use common::AppResult;
use domain::{NewRole, Permission, Role, RoleUpdate};

use crate::cache::{keys, Cache, CacheScope};
use crate::repository::RoleRepository;

/// Cache-aside decorator over any [`RoleRepository`].
pub struct CachedRoleRepository {
    inner: Arc<dyn RoleRepository>,
    cache: Cache,
}

/// Copy of `role` with the attached permissions removed.
fn detached(role: &Role) -> Role {
    Role {
        permissions: Vec::new(),
        ..role.clone()
    }
}

impl CachedRoleRepository {
    pub fn new(inner: Arc<dyn RoleRepository>, cache: Cache) -> Self {
        Self { inner, cache }
    }

    async fn hydrate(&self, mut role: Role) -> AppResult<Role> {
        role.permissions = self.inner.get_role_permissions(role.id).await?;
        Ok(role)
    }

    async fn find_cached(
        &self,
        key: &str,
        load: impl std::future::Future<Output = AppResult<Option<Role>>>,
    ) -> AppResult<Option<Role>> {
        if let Some(role) = self.cache.lookup::<Role>(key).await {
            return self.hydrate(role).await.map(Some);
        }

        let role = load.await?;
        if let Some(role) = &role {
            self.cache.store(key, &detached(role)).await;
        }
        Ok(role)
    }
}

#[async_trait]
impl RoleRepository for CachedRoleRepository {
    async fn create(&self, role: NewRole) -> AppResult<Role> {
        let role = self.inner.create(role).await?;
        self.cache.invalidate(&[CacheScope::Roles]).await;
        Ok(role)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Role>> {
        self.find_cached(&keys::role(id), self.inner.find_by_id(id)).await
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.find_cached(&keys::role_by_name(name), self.inner.find_by_name(name))
            .await
    }

    async fn list(&self) -> AppResult<Vec<Role>> {
        if let Some(roles) = self.cache.lookup::<Vec<Role>>(keys::ROLES_ALL).await {
            return try_join_all(roles.into_iter().map(|r| self.hydrate(r))).await;
        }

        let roles = self.inner.list().await?;
        let bare: Vec<Role> = roles.iter().map(detached).collect();
        self.cache.store(keys::ROLES_ALL, &bare).await;
        Ok(roles)
    }

    async fn update(&self, id: Uuid, update: RoleUpdate) -> AppResult<()> {
        self.inner.update(id, update).await?;
        self.cache.invalidate(&[CacheScope::Roles]).await;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.inner.delete(id).await?;
        self.cache
            .invalidate(&[CacheScope::Roles, CacheScope::UserPermissions])
            .await;
        Ok(())
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> AppResult<Vec<Permission>> {
        self.inner.get_role_permissions(role_id).await
    }

    async fn assign_permissions(&self, role_id: Uuid, permission_ids: Vec<Uuid>) -> AppResult<()> {
        self.inner.assign_permissions(role_id, permission_ids).await?;
        self.cache
            .invalidate(&[CacheScope::Roles, CacheScope::UserPermissions])
            .await;
        Ok(())
    }
}
