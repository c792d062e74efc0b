//! Domain-level constants.
//!
//! These constants define business rules and the default access-control catalogue.

// =============================================================================
// Default Roles
// =============================================================================

/// Full administrative access
pub const ROLE_ADMIN: &str = "admin";

/// Oversees editors and viewers
pub const ROLE_SUPERVISOR: &str = "supervisor";

/// Can modify content
pub const ROLE_EDITOR: &str = "editor";

/// Read-only access
pub const ROLE_VIEWER: &str = "viewer";

/// Roles seeded into a fresh store, with their descriptions
pub const DEFAULT_ROLES: &[(&str, &str)] = &[
    (ROLE_ADMIN, "Administrator with full access"),
    (ROLE_SUPERVISOR, "Supervisor with elevated access"),
    (ROLE_EDITOR, "Editor with write access"),
    (ROLE_VIEWER, "Viewer with read-only access"),
];

// =============================================================================
// Default Permissions
// =============================================================================

/// Resources guarded by the default permission catalogue
pub const DEFAULT_RESOURCES: &[&str] = &["user", "role", "permission"];

/// Actions granted on each default resource
pub const DEFAULT_ACTIONS: &[&str] = &["read", "write", "delete"];

/// Canonical permission name for a resource/action pair (e.g. `user:read`)
pub fn permission_name(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Username of the seeded administrator account
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Email of the seeded administrator account
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

// =============================================================================
// Validation
// =============================================================================

/// Minimum password length requirement
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length (matches the relational column width)
pub const MAX_USERNAME_LENGTH: usize = 50;

// =============================================================================
// Pagination
// =============================================================================

/// Page size used when a caller does not supply one
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Upper bound on a single page
pub const MAX_PAGE_SIZE: u64 = 100;
