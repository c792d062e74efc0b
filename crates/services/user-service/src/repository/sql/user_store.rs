//! User repository over the relational backend.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{NewUser, Permission, Role, User, UserUpdate};

use super::{reads, writes, SqlTx};
use crate::repository::entities::user;
use crate::repository::UserRepository;
use crate::transaction::TransactionManager;

/// Pooled user store. Multi-step writes go through the transaction manager.
pub struct SqlUserStore {
    db: DatabaseConnection,
    tx: TransactionManager<SqlTx>,
}

impl SqlUserStore {
    pub fn new(db: DatabaseConnection, tx: TransactionManager<SqlTx>) -> Self {
        Self { db, tx }
    }
}

#[async_trait]
impl UserRepository for SqlUserStore {
    async fn create(&self, user: NewUser) -> AppResult<User> {
        writes::insert_user(&self.db, user).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        reads::find_user(&self.db, user::Column::Id.eq(id)).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        reads::find_user(&self.db, user::Column::Username.eq(username)).await
    }

    async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Username)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await
            .map_err(AppError::db("list users"))?
            .into_iter()
            .map(User::from)
            .collect();

        reads::attach_roles(&self.db, &mut users).await?;
        Ok(users)
    }

    async fn count(&self) -> AppResult<u64> {
        user::Entity::find()
            .count(&self.db)
            .await
            .map_err(AppError::db("count users"))
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> AppResult<()> {
        writes::update_user(&self.db, id, update).await
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        writes::update_user_password(&self.db, id, password_hash).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        writes::delete_user(&self.db, id).await
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
