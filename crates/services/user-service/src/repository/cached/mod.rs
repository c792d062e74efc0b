//! Cache-aside repository decorators.
//!
//! Each decorator wraps any backend store behind the same trait:
//!
//! - **Reads**: check the cache, on miss fetch from the store and populate
//! - **Writes**: persist, then invalidate the affected scopes
//!
//! Attached associations (a user's roles, a role's permissions) are never
//! part of a cached payload. They are stripped before caching and fetched
//! live on every hit, so role or permission changes never leave a stale
//! joined copy behind.
//!
//! ```ignore
//! let store: Arc<dyn UserRepository> = Arc::new(SqlUserStore::new(db, tx));
//! let users = CachedUserRepository::new(store, cache.clone());
//! ```

mod permission;
mod role;
mod user;

pub use permission::CachedPermissionRepository;
pub use role::CachedRoleRepository;
pub use user::CachedUserRepository;
