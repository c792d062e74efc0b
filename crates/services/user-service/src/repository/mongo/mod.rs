//! Document backend (MongoDB).

pub mod documents;
mod permission_store;
mod reads;
mod role_store;
mod transaction;
mod user_store;
mod writes;

pub use permission_store::MongoPermissionStore;
pub use role_store::MongoRoleStore;
pub use transaction::{transaction_manager, MongoTx, MongoTxRepository};
pub use user_store::MongoUserStore;
