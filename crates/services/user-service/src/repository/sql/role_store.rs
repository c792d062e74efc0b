//! Role repository over the relational backend.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryOrder};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{NewRole, Permission, Role, RoleUpdate};

use super::{reads, writes, SqlTx};
use crate::repository::entities::role;
use crate::repository::RoleRepository;
use crate::transaction::TransactionManager;

pub struct SqlRoleStore {
    db: DatabaseConnection,
    tx: TransactionManager<SqlTx>,
}

impl SqlRoleStore {
    pub fn new(db: DatabaseConnection, tx: TransactionManager<SqlTx>) -> Self {
        Self { db, tx }
    }
}

#[async_trait]
impl RoleRepository for SqlRoleStore {
    async fn create(&self, role: NewRole) -> AppResult<Role> {
        writes::insert_role(&self.db, role).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Role>> {
        reads::find_role(&self.db, role::Column::Id.eq(id)).await
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        reads::find_role(&self.db, role::Column::Name.eq(name)).await
    }

    async fn list(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = role::Entity::find()
            .order_by_asc(role::Column::Name)
            .all(&self.db)
            .await
            .map_err(AppError::db("list roles"))?
            .into_iter()
            .map(Role::from)
            .collect();

        reads::attach_permissions(&self.db, &mut roles).await?;
        Ok(roles)
    }

    async fn update(&self, id: Uuid, update: RoleUpdate) -> AppResult<()> {
        writes::update_role(&self.db, id, update).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        writes::delete_role(&self.db, id).await
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> AppResult<Vec<Permission>> {
        reads::permissions_for_role(&self.db, role_id).await
    }

    async fn assign_permissions(&self, role_id: Uuid, permission_ids: Vec<Uuid>) -> AppResult<()> {
        self.tx
            .execute_tx(move |repo| {
                Box::pin(async move { repo.replace_role_permissions(role_id, permission_ids).await })
            })
            .await
    }
}
