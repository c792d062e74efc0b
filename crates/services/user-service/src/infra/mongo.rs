//! Document store connection and index setup.

use std::time::Duration;

use bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

use common::DocumentStoreConfig;

use crate::repository::mongo::documents;

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// MongoDB client plus the database every collection lives in
#[derive(Clone)]
pub struct DocumentStore {
    client: Client,
    database: Database,
}

impl DocumentStore {
    /// Connect, verify the server answers and make sure unique indexes exist.
    pub async fn connect(config: &DocumentStoreConfig) -> mongodb::error::Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.app_name = Some("user-service".to_string());

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        let store = Self { client, database };

        store.ping().await?;
        store.ensure_indexes().await?;
        tracing::info!(database = %config.database, "Document store connected");

        Ok(store)
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn database(&self) -> Database {
        self.database.clone()
    }

    pub async fn ping(&self) -> mongodb::error::Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Unique indexes backing the uniqueness rules the relational schema
    /// enforces with constraints.
    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let indexes: [(&str, Document, &str); 7] = [
            (documents::USERS, doc! { "username": 1 }, "uniq_users_username"),
            (documents::USERS, doc! { "email": 1 }, "uniq_users_email"),
            (documents::ROLES, doc! { "name": 1 }, "uniq_roles_name"),
            (documents::PERMISSIONS, doc! { "name": 1 }, "uniq_permissions_name"),
            (
                documents::PERMISSIONS,
                doc! { "resource": 1, "action": 1 },
                "uniq_permissions_resource_action",
            ),
            (
                documents::USER_ROLES,
                doc! { "user_id": 1, "role_id": 1 },
                "uniq_user_roles_pair",
            ),
            (
                documents::ROLE_PERMISSIONS,
                doc! { "role_id": 1, "permission_id": 1 },
                "uniq_role_permissions_pair",
            ),
        ];

        for (collection, keys, name) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name(name.to_string())
                        .build(),
                )
                .build();

            self.database
                .collection::<Document>(collection)
                .create_index(model)
                .await?;
        }

        tracing::debug!("Document store indexes ensured");
        Ok(())
    }
}
