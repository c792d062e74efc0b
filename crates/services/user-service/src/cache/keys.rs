//! Cache key builders and invalidation scopes.
//!
//! Every cached read derives its key here so writers can invalidate with
//! patterns that cover all of them.

use uuid::Uuid;

pub const USERS_COUNT: &str = "users:count";
pub const ROLES_ALL: &str = "roles:all";
pub const PERMISSIONS_ALL: &str = "permissions:all";

pub fn user(id: Uuid) -> String {
    format!("user:{}", id)
}

pub fn user_by_username(username: &str) -> String {
    format!("user:username:{}", username)
}

pub fn users_page(limit: u64, offset: u64) -> String {
    format!("users:limit:{}:offset:{}", limit, offset)
}

/// Resolved permission set of a user (through all of its roles)
pub fn user_permissions(id: Uuid) -> String {
    format!("user:permissions:{}", id)
}

pub fn user_has_permission(id: Uuid, resource: &str, action: &str) -> String {
    format!("user:permissions:{}:{}:{}", id, resource, action)
}

pub fn role(id: Uuid) -> String {
    format!("role:{}", id)
}

pub fn role_by_name(name: &str) -> String {
    format!("role:name:{}", name)
}

pub fn permission(id: Uuid) -> String {
    format!("permission:{}", id)
}

pub fn permission_by_resource_action(resource: &str, action: &str) -> String {
    format!("permission:resource:{}:action:{}", resource, action)
}

pub fn permissions_by_resource(resource: &str) -> String {
    format!("permissions:resource:{}", resource)
}

/// Group of cache keys cleared together after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Users by id, by username, pages and count
    Users,
    /// Roles by id, by name and the full list
    Roles,
    /// Permissions by id, by pair, by resource and the full list
    Permissions,
    /// Per-user resolved permissions and permission checks
    UserPermissions,
}

impl CacheScope {
    /// Writes that change the permission graph
    pub const PERMISSION_GRAPH: &'static [CacheScope] = &[
        CacheScope::Permissions,
        CacheScope::Roles,
        CacheScope::UserPermissions,
    ];

    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            CacheScope::Users => &["user:*", "users:*"],
            CacheScope::Roles => &["role:*", "roles:*"],
            CacheScope::Permissions => &["permission:*", "permissions:*"],
            CacheScope::UserPermissions => &["user:permissions:*"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pattern_matches;

    fn covered(scope: CacheScope, key: &str) -> bool {
        scope.patterns().iter().any(|p| pattern_matches(p, key))
    }

    #[test]
    fn test_user_scope_covers_every_user_key() {
        let id = Uuid::new_v4();
        for key in [
            user(id),
            user_by_username("jdoe"),
            users_page(10, 20),
            USERS_COUNT.to_string(),
            user_permissions(id),
        ] {
            assert!(covered(CacheScope::Users, &key), "{key} not covered");
        }
        assert!(!covered(CacheScope::Users, &role(id)));
    }

    #[test]
    fn test_user_permissions_scope_is_narrow() {
        let id = Uuid::new_v4();
        assert!(covered(CacheScope::UserPermissions, &user_permissions(id)));
        assert!(covered(
            CacheScope::UserPermissions,
            &user_has_permission(id, "doc", "read")
        ));
        assert!(!covered(CacheScope::UserPermissions, &user(id)));
    }

    #[test]
    fn test_permission_graph_scopes() {
        let id = Uuid::new_v4();
        let keys = [
            permission(id),
            permission_by_resource_action("doc", "read"),
            permissions_by_resource("doc"),
            PERMISSIONS_ALL.to_string(),
            role(id),
            role_by_name("editor"),
            ROLES_ALL.to_string(),
            user_permissions(id),
        ];

        for key in keys {
            assert!(
                CacheScope::PERMISSION_GRAPH
                    .iter()
                    .any(|scope| covered(*scope, &key)),
                "{key} not covered"
            );
        }
    }
}
