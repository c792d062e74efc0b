//! User repository over the document backend.

use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use mongodb::Database;
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{NewUser, Permission, Role, User, UserUpdate};

use super::documents::{self, UserDocument};
use super::{reads, writes, MongoTx};
use crate::repository::UserRepository;
use crate::transaction::TransactionManager;

pub struct MongoUserStore {
    db: Database,
    tx: TransactionManager<MongoTx>,
}

impl MongoUserStore {
    pub fn new(db: Database, tx: TransactionManager<MongoTx>) -> Self {
        Self { db, tx }
    }
}

#[async_trait]
impl UserRepository for MongoUserStore {
    async fn create(&self, user: NewUser) -> AppResult<User> {
        writes::insert_user(&self.db, None, user).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        reads::find_user(&self.db, doc! { "_id": id.to_string() }).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        reads::find_user(&self.db, doc! { "username": username }).await
    }

    async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<User>> {
        let docs: Vec<UserDocument> = documents::users(&self.db)
            .find(doc! {})
            .sort(doc! { "created_at": -1, "username": 1 })
            .skip(offset)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(AppError::document("list users"))?
            .try_collect()
            .await
            .map_err(AppError::document("list users"))?;

        let mut users = docs
            .into_iter()
            .map(User::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        reads::attach_roles(&self.db, &mut users).await?;
        Ok(users)
    }

    async fn count(&self) -> AppResult<u64> {
        documents::users(&self.db)
            .count_documents(doc! {})
            .await
            .map_err(AppError::document("count users"))
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> AppResult<()> {
        writes::update_user(&self.db, None, id, update).await
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        writes::update_user_password(&self.db, None, id, password_hash).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.tx
            .execute_tx(move |repo| Box::pin(async move { repo.delete_user(id).await }))
            .await
    }

    async fn get_user_roles(&self, user_id: Uuid) -> AppResult<Vec<Role>> {
        reads::roles_for_user(&self.db, user_id).await
    }

    async fn get_user_permissions(&self, user_id: Uuid) -> AppResult<Vec<Permission>> {
        reads::permissions_for_user(&self.db, user_id).await
    }

    async fn has_permission(&self, user_id: Uuid, resource: &str, action: &str) -> AppResult<bool> {
        reads::user_has_permission(&self.db, user_id, resource, action).await
    }

    async fn assign_roles(&self, user_id: Uuid, role_ids: Vec<Uuid>) -> AppResult<()> {
        self.tx
            .execute_tx(move |repo| {
                Box::pin(async move { repo.replace_user_roles(user_id, role_ids).await })
            })
            .await
    }
}
