//! Write statements shared by the pooled stores and the transaction scope.
//!
//! Every function takes any [`ConnectionTrait`], so the same statement runs
//! against the pool for a direct write or against an open transaction inside
//! `execute_tx`.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use common::{error::ensure_found, AppError, AppResult};
use domain::{
    NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RolePermission,
    RoleUpdate, User, UserRole, UserUpdate,
};

use crate::repository::dedup_ids;
use crate::repository::entities::{permission, role, role_permission, user, user_role};

// =============================================================================
// Users
// =============================================================================

pub(crate) async fn insert_user<C: ConnectionTrait>(conn: &C, new: NewUser) -> AppResult<User> {
    let now = Utc::now();
    let model = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(new.username),
        email: Set(new.email),
        password_hash: Set(new.password_hash),
        first_name: Set(new.first_name),
        last_name: Set(new.last_name),
        is_active: Set(new.is_active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(AppError::db("create user"))?;

    Ok(User::from(model))
}

pub(crate) async fn update_user<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    update: UserUpdate,
) -> AppResult<()> {
    let result = user::Entity::update_many()
        .col_expr(user::Column::Username, Expr::value(update.username))
        .col_expr(user::Column::Email, Expr::value(update.email))
        .col_expr(user::Column::FirstName, Expr::value(update.first_name))
        .col_expr(user::Column::LastName, Expr::value(update.last_name))
        .col_expr(user::Column::IsActive, Expr::value(update.is_active))
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(id))
        .exec(conn)
        .await
        .map_err(AppError::db("update user"))?;

    ensure_found(result.rows_affected, "user")
}

pub(crate) async fn update_user_password<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    password_hash: String,
) -> AppResult<()> {
    let result = user::Entity::update_many()
        .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(id))
        .exec(conn)
        .await
        .map_err(AppError::db("update user password"))?;

    ensure_found(result.rows_affected, "user")
}

pub(crate) async fn delete_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    // user_roles rows go with it through ON DELETE CASCADE
    let result = user::Entity::delete_by_id(id)
        .exec(conn)
        .await
        .map_err(AppError::db("delete user"))?;

    ensure_found(result.rows_affected, "user")
}

pub(crate) async fn replace_user_roles<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    role_ids: Vec<Uuid>,
) -> AppResult<()> {
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(conn)
        .await
        .map_err(AppError::db("clear user roles"))?;

    let role_ids = dedup_ids(role_ids);
    if role_ids.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let rows = role_ids.into_iter().map(|role_id| {
        user_role::ActiveModel::from(UserRole {
            user_id,
            role_id,
            created_at: now,
        })
    });

    user_role::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await
        .map_err(AppError::db("assign user roles"))?;

    Ok(())
}

// =============================================================================
// Roles
// =============================================================================

pub(crate) async fn insert_role<C: ConnectionTrait>(conn: &C, new: NewRole) -> AppResult<Role> {
    let now = Utc::now();
    let model = role::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(new.name),
        description: Set(new.description),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(AppError::db("create role"))?;

    Ok(Role::from(model))
}

pub(crate) async fn update_role<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    update: RoleUpdate,
) -> AppResult<()> {
    let result = role::Entity::update_many()
        .col_expr(role::Column::Name, Expr::value(update.name))
        .col_expr(role::Column::Description, Expr::value(update.description))
        .col_expr(role::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(role::Column::Id.eq(id))
        .exec(conn)
        .await
        .map_err(AppError::db("update role"))?;

    ensure_found(result.rows_affected, "role")
}

pub(crate) async fn delete_role<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    let result = role::Entity::delete_by_id(id)
        .exec(conn)
        .await
        .map_err(AppError::db("delete role"))?;

    ensure_found(result.rows_affected, "role")
}

pub(crate) async fn replace_role_permissions<C: ConnectionTrait>(
    conn: &C,
    role_id: Uuid,
    permission_ids: Vec<Uuid>,
) -> AppResult<()> {
    role_permission::Entity::delete_many()
        .filter(role_permission::Column::RoleId.eq(role_id))
        .exec(conn)
        .await
        .map_err(AppError::db("clear role permissions"))?;

    let permission_ids = dedup_ids(permission_ids);
    if permission_ids.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let rows = permission_ids
        .into_iter()
        .map(|permission_id| {
            role_permission::ActiveModel::from(RolePermission {
                role_id,
                permission_id,
                created_at: now,
            })
        });

    role_permission::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await
        .map_err(AppError::db("assign role permissions"))?;

    Ok(())
}

// =============================================================================
// Permissions
// =============================================================================

pub(crate) async fn insert_permission<C: ConnectionTrait>(
    conn: &C,
    new: NewPermission,
) -> AppResult<Permission> {
    let now = Utc::now();
    let model = permission::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(new.name),
        resource: Set(new.resource),
        action: Set(new.action),
        description: Set(new.description),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(AppError::db("create permission"))?;

    Ok(Permission::from(model))
}

pub(crate) async fn update_permission<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    update: PermissionUpdate,
) -> AppResult<()> {
    let result = permission::Entity::update_many()
        .col_expr(permission::Column::Name, Expr::value(update.name))
        .col_expr(permission::Column::Resource, Expr::value(update.resource))
        .col_expr(permission::Column::Action, Expr::value(update.action))
        .col_expr(permission::Column::Description, Expr::value(update.description))
        .col_expr(permission::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(permission::Column::Id.eq(id))
        .exec(conn)
        .await
        .map_err(AppError::db("update permission"))?;

    ensure_found(result.rows_affected, "permission")
}

pub(crate) async fn delete_permission<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    let result = permission::Entity::delete_by_id(id)
        .exec(conn)
        .await
        .map_err(AppError::db("delete permission"))?;

    ensure_found(result.rows_affected, "permission")
}
