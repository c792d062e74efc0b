//! Service layer - use cases over the repositories and transaction manager.
//!
//! Multi-step writes run through `execute_tx`; the affected cache scopes are
//! cleared only once it has returned `Ok`.

mod container;
mod permission_service;
mod role_service;
mod user_service;

pub use container::Services;
pub use permission_service::{PermissionManager, PermissionService};
pub use role_service::{RoleManager, RoleService};
pub use user_service::{UserManager, UserPage, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use permission_service::MockPermissionService;
#[cfg(any(test, feature = "test-utils"))]
pub use role_service::MockRoleService;
#[cfg(any(test, feature = "test-utils"))]
pub use user_service::MockUserService;
