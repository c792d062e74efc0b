//! Cached permission repository decorator.
//!
//! Every permission write changes the permission graph, so all of them clear
//! roles and resolved user permissions along with the permission keys.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use common::AppResult;
use domain::{NewPermission, Permission, PermissionUpdate};

use crate::cache::{keys, Cache, CacheScope};
use crate::repository::PermissionRepository;

/// Cache-aside decorator over any [`PermissionRepository`].
pub struct CachedPermissionRepository {
    inner: Arc<dyn PermissionRepository>,
    cache: Cache,
}

impl CachedPermissionRepository {
    pub fn new(inner: Arc<dyn PermissionRepository>, cache: Cache) -> Self {
        Self { inner, cache }
    }

    async fn cached<T>(
        &self,
        key: &str,
        load: impl std::future::Future<Output = AppResult<T>>,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        if let Some(value) = self.cache.lookup::<T>(key).await {
            return Ok(value);
        }

        let value = load.await?;
        self.cache.store(key, &value).await;
        Ok(value)
    }
}

#[async_trait]
impl PermissionRepository for CachedPermissionRepository {
    async fn create(&self, permission: NewPermission) -> AppResult<Permission> {
        let permission = self.inner.create(permission).await?;
        self.cache.invalidate(CacheScope::PERMISSION_GRAPH).await;
        Ok(permission)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Permission>> {
        let key = keys::permission(id);
        if let Some(permission) = self.cache.lookup::<Permission>(&key).await {
            return Ok(Some(permission));
        }

        let permission = self.inner.find_by_id(id).await?;
        if let Some(permission) = &permission {
            self.cache.store(&key, permission).await;
        }
        Ok(permission)
    }

    async fn find_by_resource_action(
        &self,
        resource: &str,
        action: &str,
    ) -> AppResult<Option<Permission>> {
        let key = keys::permission_by_resource_action(resource, action);
        if let Some(permission) = self.cache.lookup::<Permission>(&key).await {
            return Ok(Some(permission));
        }

        let permission = self.inner.find_by_resource_action(resource, action).await?;
        if let Some(permission) = &permission {
            self.cache.store(&key, permission).await;
        }
        Ok(permission)
    }

    async fn list(&self) -> AppResult<Vec<Permission>> {
        self.cached(keys::PERMISSIONS_ALL, self.inner.list()).await
    }

    async fn list_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>> {
        self.cached(
            &keys::permissions_by_resource(resource),
            self.inner.list_by_resource(resource),
        )
        .await
    }

    async fn update(&self, id: Uuid, update: PermissionUpdate) -> AppResult<()> {
        self.inner.update(id, update).await?;
        self.cache.invalidate(CacheScope::PERMISSION_GRAPH).await;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.inner.delete(id).await?;
        self.cache.invalidate(CacheScope::PERMISSION_GRAPH).await;
        Ok(())
    }
}
