//! Read queries for the relational backend.

use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{Permission, Role, User};

use crate::repository::entities::{permission, role, role_permission, user, user_role};

/// Roles held by a user, ordered by name
pub(crate) async fn roles_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Vec<Role>> {
    let models = role::Entity::find()
        .inner_join(user_role::Entity)
        .filter(user_role::Column::UserId.eq(user_id))
        .order_by_asc(role::Column::Name)
        .all(conn)
        .await
        .map_err(AppError::db("get user roles"))?;

    Ok(models.into_iter().map(Role::from).collect())
}

/// Permissions granted to a role, ordered by name
pub(crate) async fn permissions_for_role<C: ConnectionTrait>(
    conn: &C,
    role_id: Uuid,
) -> AppResult<Vec<Permission>> {
    let models = permission::Entity::find()
        .inner_join(role_permission::Entity)
        .filter(role_permission::Column::RoleId.eq(role_id))
        .order_by_asc(permission::Column::Name)
        .all(conn)
        .await
        .map_err(AppError::db("get role permissions"))?;

    Ok(models.into_iter().map(Permission::from).collect())
}

/// Distinct permissions reachable from a user through any of its roles
pub(crate) async fn permissions_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<Permission>> {
    let models = permission::Entity::find()
        .inner_join(role_permission::Entity)
        .join(JoinType::InnerJoin, role_permission::Relation::Role.def())
        .join(JoinType::InnerJoin, role::Relation::UserRole.def())
        .filter(user_role::Column::UserId.eq(user_id))
        .distinct()
        .order_by_asc(permission::Column::Name)
        .all(conn)
        .await
        .map_err(AppError::db("get user permissions"))?;

    Ok(models.into_iter().map(Permission::from).collect())
}

pub(crate) async fn user_has_permission<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    resource: &str,
    action: &str,
) -> AppResult<bool> {
    let matches = permission::Entity::find()
        .inner_join(role_permission::Entity)
        .join(JoinType::InnerJoin, role_permission::Relation::Role.def())
        .join(JoinType::InnerJoin, role::Relation::UserRole.def())
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(permission::Column::Resource.eq(resource))
        .filter(permission::Column::Action.eq(action))
        .count(conn)
        .await
        .map_err(AppError::db("check user permission"))?;

    Ok(matches > 0)
}

/// Attach roles to a batch of users with two queries instead of one per user
pub(crate) async fn attach_roles<C: ConnectionTrait>(conn: &C, users: &mut [User]) -> AppResult<()> {
    if users.is_empty() {
        return Ok(());
    }

    let user_ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let links = user_role::Entity::find()
        .filter(user_role::Column::UserId.is_in(user_ids))
        .all(conn)
        .await
        .map_err(AppError::db("get user roles"))?;

    let role_ids: Vec<Uuid> = links.iter().map(|l| l.role_id).collect();
    let roles: HashMap<Uuid, Role> = role::Entity::find()
        .filter(role::Column::Id.is_in(role_ids))
        .all(conn)
        .await
        .map_err(AppError::db("get user roles"))?
        .into_iter()
        .map(|m| (m.id, Role::from(m)))
        .collect();

    let mut by_user: HashMap<Uuid, Vec<Role>> = HashMap::new();
    for link in links {
        if let Some(role) = roles.get(&link.role_id) {
            by_user.entry(link.user_id).or_default().push(role.clone());
        }
    }

    for user in users.iter_mut() {
        let mut roles = by_user.remove(&user.id).unwrap_or_default();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        user.roles = roles;
    }

    Ok(())
}

/// Attach permissions to a batch of roles
pub(crate) async fn attach_permissions<C: ConnectionTrait>(
    conn: &C,
    roles: &mut [Role],
) -> AppResult<()> {
    if roles.is_empty() {
        return Ok(());
    }

    let role_ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
    let links = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.is_in(role_ids))
        .all(conn)
        .await
        .map_err(AppError::db("get role permissions"))?;

    let permission_ids: Vec<Uuid> = links.iter().map(|l| l.permission_id).collect();
    let permissions: HashMap<Uuid, Permission> = permission::Entity::find()
        .filter(permission::Column::Id.is_in(permission_ids))
        .all(conn)
        .await
        .map_err(AppError::db("get role permissions"))?
        .into_iter()
        .map(|m| (m.id, Permission::from(m)))
        .collect();

    let mut by_role: HashMap<Uuid, Vec<Permission>> = HashMap::new();
    for link in links {
        if let Some(permission) = permissions.get(&link.permission_id) {
            by_role.entry(link.role_id).or_default().push(permission.clone());
        }
    }

    for role in roles.iter_mut() {
        let mut permissions = by_role.remove(&role.id).unwrap_or_default();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        role.permissions = permissions;
    }

    Ok(())
}

pub(crate) async fn find_user<C: ConnectionTrait>(
    conn: &C,
    filter: impl sea_orm::sea_query::IntoCondition,
) -> AppResult<Option<User>> {
    let Some(model) = user::Entity::find()
        .filter(filter)
        .one(conn)
        .await
        .map_err(AppError::db("find user"))?
    else {
        return Ok(None);
    };

    let mut user = User::from(model);
    user.roles = roles_for_user(conn, user.id).await?;
    Ok(Some(user))
}

pub(crate) async fn find_role<C: ConnectionTrait>(
    conn: &C,
    filter: impl sea_orm::sea_query::IntoCondition,
) -> AppResult<Option<Role>> {
    let Some(model) = role::Entity::find()
        .filter(filter)
        .one(conn)
        .await
        .map_err(AppError::db("find role"))?
    else {
        return Ok(None);
    };

    let mut role = Role::from(model);
    role.permissions = permissions_for_role(conn, role.id).await?;
    Ok(Some(role))
}
