//! Repository layer for data access.
//!
//! The traits here are the only surface services see. `sql` and `mongo`
//! implement them per backend, `cached` layers cache-aside reads and
//! invalidation on top of either, and `factory` wires the selected backend.

pub mod cached;
pub mod entities;
pub mod factory;
pub mod mongo;
pub mod sql;

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use common::AppResult;
use domain::{
    NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RoleUpdate, User,
    UserUpdate,
};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

pub use cached::{CachedPermissionRepository, CachedRoleRepository, CachedUserRepository};
pub use factory::{Backend, Repositories, RepositoryFactory};

/// User repository trait for dependency injection.
///
/// Single-call writes are atomic on their own; anything that also touches
/// role assignments runs through the transaction manager.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user without role assignments
    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Find user by ID with its roles attached
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find user by username with its roles attached
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Page of users, newest first
    async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<User>>;

    async fn count(&self) -> AppResult<u64>;

    /// Replace the profile fields. Not found when no user has `id`.
    async fn update(&self, id: Uuid, update: UserUpdate) -> AppResult<()>;

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()>;

    /// Delete a user and its role assignments
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    async fn get_user_roles(&self, user_id: Uuid) -> AppResult<Vec<Role>>;

    /// Distinct permissions granted through any of the user's roles
    async fn get_user_permissions(&self, user_id: Uuid) -> AppResult<Vec<Permission>>;

    async fn has_permission(&self, user_id: Uuid, resource: &str, action: &str) -> AppResult<bool>;

    /// Replace the user's roles in a transaction of its own
    async fn assign_roles(&self, user_id: Uuid, role_ids: Vec<Uuid>) -> AppResult<()>;
}

/// Role repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(&self, role: NewRole) -> AppResult<Role>;

    /// Find role by ID with its permissions attached
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Role>>;

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// All roles ordered by name, permissions attached
    async fn list(&self) -> AppResult<Vec<Role>>;

    async fn update(&self, id: Uuid, update: RoleUpdate) -> AppResult<()>;

    /// Delete a role and every assignment and grant that references it
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    async fn get_role_permissions(&self, role_id: Uuid) -> AppResult<Vec<Permission>>;

    /// Replace the role's permissions in a transaction of its own
    async fn assign_permissions(&self, role_id: Uuid, permission_ids: Vec<Uuid>) -> AppResult<()>;
}

/// Permission repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(&self, permission: NewPermission) -> AppResult<Permission>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Permission>>;

    async fn find_by_resource_action(
        &self,
        resource: &str,
        action: &str,
    ) -> AppResult<Option<Permission>>;

    /// All permissions ordered by resource then action
    async fn list(&self) -> AppResult<Vec<Permission>>;

    async fn list_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>>;

    async fn update(&self, id: Uuid, update: PermissionUpdate) -> AppResult<()>;

    /// Delete a permission and revoke it from every role
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Drop repeated ids, keeping first occurrence order.
pub(crate) fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_ids_keeps_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(dedup_ids(vec![a, b, a, b, a]), vec![a, b]);
        assert!(dedup_ids(Vec::new()).is_empty());
    }
}
