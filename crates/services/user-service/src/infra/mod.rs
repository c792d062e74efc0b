//! Infrastructure layer - backend connections, migrations and seeding.

mod db;
pub mod migrations;
mod mongo;
pub mod retry;
pub mod seed;

pub use db::{Database, MigrationState};
pub use migrations::Migrator;
pub use mongo::DocumentStore;
pub use retry::connect_with_retry;
pub use seed::{seed_defaults, SeedReport};
