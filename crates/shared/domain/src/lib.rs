//! Domain layer - Core identity and access-control entities.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.
//! Both persistence backends map their native records onto these types.

pub mod constants;
pub mod error;
pub mod password;
pub mod permission;
pub mod role;
pub mod user;

pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use password::Password;
pub use permission::{
    CreatePermission, NewPermission, Permission, PermissionUpdate, RolePermission,
    UpdatePermission,
};
pub use role::{CreateRole, NewRole, Role, RoleUpdate, UpdateRole};
pub use user::{CreateUser, NewUser, UpdateUser, User, UserRole, UserUpdate};
