//! Permission database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::Permission;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::role_permission::Entity")]
    RolePermission,
}

impl Related<super::role_permission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RolePermission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Permission {
    fn from(model: Model) -> Self {
        Permission {
            id: model.id,
            name: model.name,
            resource: model.resource,
            action: model.action,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
