//! Relational backend (SeaORM).

mod permission_store;
mod reads;
mod role_store;
mod transaction;
mod user_store;
mod writes;

pub use permission_store::SqlPermissionStore;
pub use role_store::SqlRoleStore;
pub use transaction::{transaction_manager, SqlTx, SqlTxRepository};
pub use user_store::SqlUserStore;
