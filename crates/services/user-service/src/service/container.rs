//! Service container - single access point to every domain service.

use std::sync::Arc;

use super::{
    PermissionManager, PermissionService, RoleManager, RoleService, UserManager, UserService,
};
use crate::repository::Repositories;

/// All application services, sharing one set of repositories.
#[derive(Clone)]
pub struct Services {
    users: Arc<dyn UserService>,
    roles: Arc<dyn RoleService>,
    permissions: Arc<dyn PermissionService>,
}

impl Services {
    pub fn new(
        users: Arc<dyn UserService>,
        roles: Arc<dyn RoleService>,
        permissions: Arc<dyn PermissionService>,
    ) -> Self {
        Self {
            users,
            roles,
            permissions,
        }
    }

    /// Build every service over the same repositories.
    pub fn from_repositories(repos: Repositories) -> Self {
        Self {
            users: Arc::new(UserManager::new(repos.clone())),
            roles: Arc::new(RoleManager::new(repos.clone())),
            permissions: Arc::new(PermissionManager::new(repos)),
        }
    }

    pub fn users(&self) -> Arc<dyn UserService> {
        self.users.clone()
    }

    pub fn roles(&self) -> Arc<dyn RoleService> {
        self.roles.clone()
    }

    pub fn permissions(&self) -> Arc<dyn PermissionService> {
        self.permissions.clone()
    }
}
