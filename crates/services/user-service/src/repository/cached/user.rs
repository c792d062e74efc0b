//! Cached user repository decorator.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::AppResult;
use domain::{NewUser, Permission, Role, User, UserUpdate};

use crate::cache::{keys, Cache, CacheScope};
use crate::repository::UserRepository;

/// Cached form of a user.
///
/// `User` never serializes its password hash, but a cache hit has to yield
/// the same record the store would, so the snapshot keeps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserSnapshot {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserSnapshot> for User {
    fn from(snapshot: UserSnapshot) -> Self {
        User {
            id: snapshot.id,
            username: snapshot.username,
            email: snapshot.email,
            password_hash: snapshot.password_hash,
            first_name: snapshot.first_name,
            last_name: snapshot.last_name,
            is_active: snapshot.is_active,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            roles: Vec::new(),
        }
    }
}

/// Cache-aside decorator over any [`UserRepository`].
pub struct CachedUserRepository {
    inner: Arc<dyn UserRepository>,
    cache: Cache,
}

impl CachedUserRepository {
    pub fn new(inner: Arc<dyn UserRepository>, cache: Cache) -> Self {
        Self { inner, cache }
    }

    /// Rebuild a user from its snapshot with roles read from the store.
    async fn hydrate(&self, snapshot: UserSnapshot) -> AppResult<User> {
        let mut user = User::from(snapshot);
        user.roles = self.inner.get_user_roles(user.id).await?;
        Ok(user)
    }

    async fn find_cached(
        &self,
        key: &str,
        load: impl std::future::Future<Output = AppResult<Option<User>>>,
    ) -> AppResult<Option<User>> {
        if let Some(snapshot) = self.cache.lookup::<UserSnapshot>(key).await {
            return self.hydrate(snapshot).await.map(Some);
        }

        let user = load.await?;
        if let Some(user) = &user {
            self.cache.store(key, &UserSnapshot::from(user)).await;
        }
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for CachedUserRepository {
    async fn create(&self, user: NewUser) -> AppResult<User> {
        let user = self.inner.create(user).await?;
        self.cache.invalidate(&[CacheScope::Users]).await;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.find_cached(&keys::user(id), self.inner.find_by_id(id)).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.find_cached(
            &keys::user_by_username(username),
            self.inner.find_by_username(username),
        )
        .await
    }

    async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<User>> {
        let key = keys::users_page(limit, offset);

        if let Some(snapshots) = self.cache.lookup::<Vec<UserSnapshot>>(&key).await {
            return try_join_all(snapshots.into_iter().map(|s| self.hydrate(s))).await;
        }

        let users = self.inner.list(limit, offset).await?;
        let snapshots: Vec<UserSnapshot> = users.iter().map(UserSnapshot::from).collect();
        self.cache.store(&key, &snapshots).await;
        Ok(users)
    }

    async fn count(&self) -> AppResult<u64> {
        if let Some(count) = self.cache.lookup::<u64>(keys::USERS_COUNT).await {
            return Ok(count);
        }

        let count = self.inner.count().await?;
        self.cache.store(keys::USERS_COUNT, &count).await;
        Ok(count)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> AppResult<()> {
        self.inner.update(id, update).await?;
        self.cache.invalidate(&[CacheScope::Users]).await;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        self.inner.update_password(id, password_hash).await?;
        self.cache.invalidate(&[CacheScope::Users]).await;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.inner.delete(id).await?;
        self.cache.invalidate(&[CacheScope::Users]).await;
        Ok(())
    }

    async fn get_user_roles(&self, user_id: Uuid) -> AppResult<Vec<Role>> {
        self.inner.get_user_roles(user_id).await
    }

    async fn get_user_permissions(&self, user_id: Uuid) -> AppResult<Vec<Permission>> {
        let key = keys::user_permissions(user_id);
        if let Some(permissions) = self.cache.lookup::<Vec<Permission>>(&key).await {
            return Ok(permissions);
        }

        let permissions = self.inner.get_user_permissions(user_id).await?;
        self.cache.store(&key, &permissions).await;
        Ok(permissions)
    }

    async fn has_permission(&self, user_id: Uuid, resource: &str, action: &str) -> AppResult<bool> {
        let key = keys::user_has_permission(user_id, resource, action);
        if let Some(granted) = self.cache.lookup::<bool>(&key).await {
            return Ok(granted);
        }

        let granted = self.inner.has_permission(user_id, resource, action).await?;
        self.cache.store(&key, &granted).await;
        Ok(granted)
    }

    async fn assign_roles(&self, user_id: Uuid, role_ids: Vec<Uuid>) -> AppResult<()> {
        self.inner.assign_roles(user_id, role_ids).await?;
        // user:* also covers the user's resolved permissions
        self.cache.invalidate(&[CacheScope::Users]).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::eq;

    use common::AppError;

    use super::*;
    use crate::repository::MockUserRepository;

    fn sample_user(username: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "$argon2id$hash".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
            roles: Vec::new(),
        }
    }

    fn sample_role(name: &str) -> Role {
        let now = Utc::now();
        Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            permissions: Vec::new(),
        }
    }

    fn memory_cache() -> Cache {
        Cache::in_memory(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_find_by_id_hits_store_once_and_keeps_password_hash() {
        let mut user = sample_user("jdoe");
        let editor = sample_role("editor");
        user.roles = vec![editor.clone()];
        let id = user.id;

        let mut mock = MockUserRepository::new();
        let stored = user.clone();
        mock.expect_find_by_id()
            .with(eq(id))
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        mock.expect_get_user_roles()
            .with(eq(id))
            .times(1)
            .returning(move |_| Ok(vec![editor.clone()]));

        let repo = CachedUserRepository::new(Arc::new(mock), memory_cache());

        let first = repo.find_by_id(id).await.unwrap().unwrap();
        let second = repo.find_by_id(id).await.unwrap().unwrap();

        assert_eq!(first.username, "jdoe");
        assert_eq!(second.password_hash, "$argon2id$hash");
        assert_eq!(second.role_names(), vec!["editor"]);
    }

    #[tokio::test]
    async fn test_roles_are_fetched_live_on_hit() {
        let user = sample_user("jdoe");
        let id = user.id;
        let viewer = sample_role("viewer");

        let mut mock = MockUserRepository::new();
        let stored = user.clone();
        mock.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        mock.expect_get_user_roles()
            .times(1)
            .returning(move |_| Ok(vec![viewer.clone()]));

        let repo = CachedUserRepository::new(Arc::new(mock), memory_cache());

        let miss = repo.find_by_id(id).await.unwrap().unwrap();
        assert!(miss.roles.is_empty());

        let hit = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(hit.role_names(), vec!["viewer"]);
    }

    #[tokio::test]
    async fn test_absent_user_is_not_cached() {
        let mut mock = MockUserRepository::new();
        mock.expect_find_by_username()
            .times(2)
            .returning(|_| Ok(None));

        let repo = CachedUserRepository::new(Arc::new(mock), memory_cache());

        assert!(repo.find_by_username("ghost").await.unwrap().is_none());
        assert!(repo.find_by_username("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_invalidates_user_keys() {
        let user = sample_user("jdoe");
        let id = user.id;

        let mut mock = MockUserRepository::new();
        let stored = user.clone();
        mock.expect_find_by_id()
            .times(2)
            .returning(move |_| Ok(Some(stored.clone())));
        mock.expect_update().times(1).returning(|_, _| Ok(()));

        let cache = memory_cache();
        let repo = CachedUserRepository::new(Arc::new(mock), cache.clone());

        repo.find_by_id(id).await.unwrap();
        repo.update(id, user.profile()).await.unwrap();
        assert!(cache.lookup::<UserSnapshot>(&keys::user(id)).await.is_none());

        repo.find_by_id(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cache() {
        let user = sample_user("jdoe");
        let id = user.id;

        let mut mock = MockUserRepository::new();
        mock.expect_update_password()
            .returning(|_, _| Err(AppError::not_found("user")));

        let cache = memory_cache();
        cache.set(keys::USERS_COUNT, &7u64).await.unwrap();
        let repo = CachedUserRepository::new(Arc::new(mock), cache.clone());

        let err = repo.update_password(id, "new".to_string()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cache.lookup::<u64>(keys::USERS_COUNT).await, Some(7));
    }

    #[tokio::test]
    async fn test_has_permission_is_cached_per_pair() {
        let id = Uuid::new_v4();

        let mut mock = MockUserRepository::new();
        mock.expect_has_permission()
            .withf(|_, resource, action| resource == "doc" && action == "read")
            .times(1)
            .returning(|_, _, _| Ok(true));
        mock.expect_has_permission()
            .withf(|_, resource, action| resource == "doc" && action == "delete")
            .times(1)
            .returning(|_, _, _| Ok(false));

        let repo = CachedUserRepository::new(Arc::new(mock), memory_cache());

        assert!(repo.has_permission(id, "doc", "read").await.unwrap());
        assert!(repo.has_permission(id, "doc", "read").await.unwrap());
        assert!(!repo.has_permission(id, "doc", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn test_assign_roles_clears_resolved_permissions() {
        let id = Uuid::new_v4();

        let mut mock = MockUserRepository::new();
        mock.expect_has_permission()
            .times(2)
            .returning(|_, _, _| Ok(true));
        mock.expect_assign_roles().times(1).returning(|_, _| Ok(()));

        let repo = CachedUserRepository::new(Arc::new(mock), memory_cache());

        repo.has_permission(id, "doc", "read").await.unwrap();
        repo.assign_roles(id, Vec::new()).await.unwrap();
        repo.has_permission(id, "doc", "read").await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_cache_always_reads_through() {
        let mut mock = MockUserRepository::new();
        mock.expect_count().times(3).returning(|| Ok(4));

        let repo = CachedUserRepository::new(Arc::new(mock), Cache::disabled());

        for _ in 0..3 {
            assert_eq!(repo.count().await.unwrap(), 4);
        }
    }
}
