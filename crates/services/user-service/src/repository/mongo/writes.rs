//! Write operations shared by the document stores and the session scope.
//!
//! Each function takes an optional session: `Some` inside `execute_tx`,
//! `None` for a direct single-document write.

use bson::doc;
use mongodb::{ClientSession, Collection, Database};
use uuid::Uuid;

use common::{error::ensure_found, AppError, AppResult};
use domain::{
    NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RolePermission,
    RoleUpdate, User, UserRole, UserUpdate,
};

use super::documents::{
    self, now, PermissionDocument, RoleDocument, RolePermissionDocument, UserDocument,
    UserRoleDocument,
};
use crate::repository::dedup_ids;

/// Await a driver action, attaching the session when there is one.
macro_rules! in_session {
    ($action:expr, $session:expr) => {
        match $session {
            Some(session) => $action.session(session).await,
            None => $action.await,
        }
    };
}

/// Fail with a validation error unless every id names a stored document.
///
/// Stands in for the foreign keys the relational schema enforces.
async fn ensure_all_exist<T: Send + Sync>(
    collection: Collection<T>,
    session: Option<&mut ClientSession>,
    ids: &[String],
    kind: &str,
) -> AppResult<()> {
    let found = in_session!(
        collection.count_documents(doc! { "_id": { "$in": ids } }),
        session
    )
    .map_err(AppError::document("check references"))?;

    if found as usize != ids.len() {
        return Err(AppError::validation(format!("unknown {} id", kind)));
    }
    Ok(())
}

// =============================================================================
// Users
// =============================================================================

pub(crate) async fn insert_user(
    db: &Database,
    session: Option<&mut ClientSession>,
    new: NewUser,
) -> AppResult<User> {
    let timestamp = now();
    let document = UserDocument {
        id: Uuid::new_v4().to_string(),
        username: new.username,
        email: new.email,
        password_hash: new.password_hash,
        first_name: new.first_name,
        last_name: new.last_name,
        is_active: new.is_active,
        created_at: timestamp,
        updated_at: timestamp,
    };

    in_session!(documents::users(db).insert_one(&document), session)
        .map_err(AppError::document("create user"))?;

    User::try_from(document)
}

pub(crate) async fn update_user(
    db: &Database,
    session: Option<&mut ClientSession>,
    id: Uuid,
    update: UserUpdate,
) -> AppResult<()> {
    let changes = doc! {
        "$set": {
            "username": update.username,
            "email": update.email,
            "first_name": update.first_name,
            "last_name": update.last_name,
            "is_active": update.is_active,
            "updated_at": bson::DateTime::now(),
        }
    };

    let result = in_session!(
        documents::users(db).update_one(doc! { "_id": id.to_string() }, changes),
        session
    )
    .map_err(AppError::document("update user"))?;

    ensure_found(result.matched_count, "user")
}

pub(crate) async fn update_user_password(
    db: &Database,
    session: Option<&mut ClientSession>,
    id: Uuid,
    password_hash: String,
) -> AppResult<()> {
    let changes = doc! {
        "$set": { "password": password_hash, "updated_at": bson::DateTime::now() }
    };

    let result = in_session!(
        documents::users(db).update_one(doc! { "_id": id.to_string() }, changes),
        session
    )
    .map_err(AppError::document("update user password"))?;

    ensure_found(result.matched_count, "user")
}

pub(crate) async fn replace_user_roles(
    db: &Database,
    mut session: Option<&mut ClientSession>,
    user_id: Uuid,
    role_ids: Vec<Uuid>,
) -> AppResult<()> {
    let parent = user_id.to_string();

    in_session!(
        documents::user_roles(db).delete_many(doc! { "user_id": parent.as_str() }),
        session.as_deref_mut()
    )
    .map_err(AppError::document("clear user roles"))?;

    let role_ids = dedup_ids(role_ids);
    if role_ids.is_empty() {
        return Ok(());
    }

    ensure_all_exist(documents::users(db), session.as_deref_mut(), &[parent], "user").await?;
    let referenced: Vec<String> = role_ids.iter().map(Uuid::to_string).collect();
    ensure_all_exist(documents::roles(db), session.as_deref_mut(), &referenced, "role").await?;

    let timestamp = now();
    let links: Vec<UserRoleDocument> = role_ids
        .into_iter()
        .map(|role_id| {
            UserRoleDocument::from(UserRole {
                user_id,
                role_id,
                created_at: timestamp,
            })
        })
        .collect();

    in_session!(documents::user_roles(db).insert_many(links), session)
        .map_err(AppError::document("assign user roles"))?;

    Ok(())
}

/// Delete a user and, since there is no cascade, its role links.
pub(crate) async fn delete_user(
    db: &Database,
    session: &mut ClientSession,
    id: Uuid,
) -> AppResult<()> {
    let id = id.to_string();

    let result = documents::users(db)
        .delete_one(doc! { "_id": id.as_str() })
        .session(&mut *session)
        .await
        .map_err(AppError::document("delete user"))?;
    ensure_found(result.deleted_count, "user")?;

    documents::user_roles(db)
        .delete_many(doc! { "user_id": id.as_str() })
        .session(&mut *session)
        .await
        .map_err(AppError::document("delete user roles"))?;

    Ok(())
}

// =============================================================================
// Roles
// =============================================================================

pub(crate) async fn insert_role(
    db: &Database,
    session: Option<&mut ClientSession>,
    new: NewRole,
) -> AppResult<Role> {
    let timestamp = now();
    let document = RoleDocument {
        id: Uuid::new_v4().to_string(),
        name: new.name,
        description: new.description,
        created_at: timestamp,
        updated_at: timestamp,
    };

    in_session!(documents::roles(db).insert_one(&document), session)
        .map_err(AppError::document("create role"))?;

    Role::try_from(document)
}

pub(crate) async fn update_role(
    db: &Database,
    session: Option<&mut ClientSession>,
    id: Uuid,
    update: RoleUpdate,
) -> AppResult<()> {
    let changes = doc! {
        "$set": {
            "name": update.name,
            "description": update.description,
            "updated_at": bson::DateTime::now(),
        }
    };

    let result = in_session!(
        documents::roles(db).update_one(doc! { "_id": id.to_string() }, changes),
        session
    )
    .map_err(AppError::document("update role"))?;

    ensure_found(result.matched_count, "role")
}

pub(crate) async fn replace_role_permissions(
    db: &Database,
    mut session: Option<&mut ClientSession>,
    role_id: Uuid,
    permission_ids: Vec<Uuid>,
) -> AppResult<()> {
    let parent = role_id.to_string();

    in_session!(
        documents::role_permissions(db).delete_many(doc! { "role_id": parent.as_str() }),
        session.as_deref_mut()
    )
    .map_err(AppError::document("clear role permissions"))?;

    let permission_ids = dedup_ids(permission_ids);
    if permission_ids.is_empty() {
        return Ok(());
    }

    ensure_all_exist(documents::roles(db), session.as_deref_mut(), &[parent], "role").await?;
    let referenced: Vec<String> = permission_ids.iter().map(Uuid::to_string).collect();
    ensure_all_exist(
        documents::permissions(db),
        session.as_deref_mut(),
        &referenced,
        "permission",
    )
    .await?;

    let timestamp = now();
    let links: Vec<RolePermissionDocument> = permission_ids
        .into_iter()
        .map(|permission_id| {
            RolePermissionDocument::from(RolePermission {
                role_id,
                permission_id,
                created_at: timestamp,
            })
        })
        .collect();

    in_session!(documents::role_permissions(db).insert_many(links), session)
        .map_err(AppError::document("assign role permissions"))?;

    Ok(())
}

/// Delete a role together with its user and permission links.
pub(crate) async fn delete_role(
    db: &Database,
    session: &mut ClientSession,
    id: Uuid,
) -> AppResult<()> {
    let id = id.to_string();

    let result = documents::roles(db)
        .delete_one(doc! { "_id": id.as_str() })
        .session(&mut *session)
        .await
        .map_err(AppError::document("delete role"))?;
    ensure_found(result.deleted_count, "role")?;

    documents::role_permissions(db)
        .delete_many(doc! { "role_id": id.as_str() })
        .session(&mut *session)
        .await
        .map_err(AppError::document("delete role permissions"))?;

    documents::user_roles(db)
        .delete_many(doc! { "role_id": id.as_str() })
        .session(&mut *session)
        .await
        .map_err(AppError::document("delete role assignments"))?;

    Ok(())
}

// =============================================================================
// Permissions
// =============================================================================

pub(crate) async fn insert_permission(
    db: &Database,
    session: Option<&mut ClientSession>,
    new: NewPermission,
) -> AppResult<Permission> {
    let timestamp = now();
    let document = PermissionDocument {
        id: Uuid::new_v4().to_string(),
        name: new.name,
        resource: new.resource,
        action: new.action,
        description: new.description,
        created_at: timestamp,
        updated_at: timestamp,
    };

    in_session!(documents::permissions(db).insert_one(&document), session)
        .map_err(AppError::document("create permission"))?;

    Permission::try_from(document)
}

pub(crate) async fn update_permission(
    db: &Database,
    session: Option<&mut ClientSession>,
    id: Uuid,
    update: PermissionUpdate,
) -> AppResult<()> {
    let changes = doc! {
        "$set": {
            "name": update.name,
            "resource": update.resource,
            "action": update.action,
            "description": update.description,
            "updated_at": bson::DateTime::now(),
        }
    };

    let result = in_session!(
        documents::permissions(db).update_one(doc! { "_id": id.to_string() }, changes),
        session
    )
    .map_err(AppError::document("update permission"))?;

    ensure_found(result.matched_count, "permission")
}

/// Delete a permission and every grant of it.
pub(crate) async fn delete_permission(
    db: &Database,
    session: &mut ClientSession,
    id: Uuid,
) -> AppResult<()> {
    let id = id.to_string();

    let result = documents::permissions(db)
        .delete_one(doc! { "_id": id.as_str() })
        .session(&mut *session)
        .await
        .map_err(AppError::document("delete permission"))?;
    ensure_found(result.deleted_count, "permission")?;

    documents::role_permissions(db)
        .delete_many(doc! { "permission_id": id.as_str() })
        .session(&mut *session)
        .await
        .map_err(AppError::document("delete permission grants"))?;

    Ok(())
}
