//! Read queries for the document backend.
//!
//! Associations live in their own collections, so every traversal is a
//! lookup of link documents followed by an `$in` query on the target.

use std::collections::HashMap;

use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::Database;
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{Permission, Role, User};

use super::documents::{self, PermissionDocument, RoleDocument};

async fn role_ids_for_user(db: &Database, user_id: &str) -> AppResult<Vec<String>> {
    let links: Vec<_> = documents::user_roles(db)
        .find(doc! { "user_id": user_id })
        .await
        .map_err(AppError::document("get user roles"))?
        .try_collect()
        .await
        .map_err(AppError::document("get user roles"))?;

    Ok(links.into_iter().map(|l| l.role_id).collect())
}

async fn permission_ids_for_roles(db: &Database, role_ids: &[String]) -> AppResult<Vec<String>> {
    let links: Vec<_> = documents::role_permissions(db)
        .find(doc! { "role_id": { "$in": role_ids } })
        .await
        .map_err(AppError::document("get role permissions"))?
        .try_collect()
        .await
        .map_err(AppError::document("get role permissions"))?;

    let mut ids: Vec<String> = links.into_iter().map(|l| l.permission_id).collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

pub(crate) async fn find_roles(db: &Database, filter: Document) -> AppResult<Vec<Role>> {
    let docs: Vec<RoleDocument> = documents::roles(db)
        .find(filter)
        .sort(doc! { "name": 1 })
        .await
        .map_err(AppError::document("find roles"))?
        .try_collect()
        .await
        .map_err(AppError::document("find roles"))?;

    docs.into_iter().map(Role::try_from).collect()
}

pub(crate) async fn find_permissions(
    db: &Database,
    filter: Document,
    sort: Document,
) -> AppResult<Vec<Permission>> {
    let docs: Vec<PermissionDocument> = documents::permissions(db)
        .find(filter)
        .sort(sort)
        .await
        .map_err(AppError::document("find permissions"))?
        .try_collect()
        .await
        .map_err(AppError::document("find permissions"))?;

    docs.into_iter().map(Permission::try_from).collect()
}

/// Roles held by a user, ordered by name
pub(crate) async fn roles_for_user(db: &Database, user_id: Uuid) -> AppResult<Vec<Role>> {
    let role_ids = role_ids_for_user(db, &user_id.to_string()).await?;
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    find_roles(db, doc! { "_id": { "$in": role_ids } }).await
}

/// Permissions granted to a role, ordered by name
pub(crate) async fn permissions_for_role(db: &Database, role_id: Uuid) -> AppResult<Vec<Permission>> {
    let permission_ids = permission_ids_for_roles(db, &[role_id.to_string()]).await?;
    if permission_ids.is_empty() {
        return Ok(Vec::new());
    }

    find_permissions(db, doc! { "_id": { "$in": permission_ids } }, doc! { "name": 1 }).await
}

/// Distinct permissions reachable from a user through any of its roles
pub(crate) async fn permissions_for_user(db: &Database, user_id: Uuid) -> AppResult<Vec<Permission>> {
    let role_ids = role_ids_for_user(db, &user_id.to_string()).await?;
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let permission_ids = permission_ids_for_roles(db, &role_ids).await?;
    if permission_ids.is_empty() {
        return Ok(Vec::new());
    }

    find_permissions(db, doc! { "_id": { "$in": permission_ids } }, doc! { "name": 1 }).await
}

pub(crate) async fn user_has_permission(
    db: &Database,
    user_id: Uuid,
    resource: &str,
    action: &str,
) -> AppResult<bool> {
    let role_ids = role_ids_for_user(db, &user_id.to_string()).await?;
    if role_ids.is_empty() {
        return Ok(false);
    }

    let permission_ids = permission_ids_for_roles(db, &role_ids).await?;
    if permission_ids.is_empty() {
        return Ok(false);
    }

    let matches = documents::permissions(db)
        .count_documents(doc! {
            "_id": { "$in": permission_ids },
            "resource": resource,
            "action": action,
        })
        .await
        .map_err(AppError::document("check user permission"))?;

    Ok(matches > 0)
}

/// Attach roles to a batch of users with two queries instead of one per user
pub(crate) async fn attach_roles(db: &Database, users: &mut [User]) -> AppResult<()> {
    if users.is_empty() {
        return Ok(());
    }

    let user_ids: Vec<String> = users.iter().map(|u| u.id.to_string()).collect();
    let links: Vec<_> = documents::user_roles(db)
        .find(doc! { "user_id": { "$in": user_ids } })
        .await
        .map_err(AppError::document("get user roles"))?
        .try_collect()
        .await
        .map_err(AppError::document("get user roles"))?;

    let role_ids: Vec<String> = links.iter().map(|l| l.role_id.clone()).collect();
    let roles: HashMap<String, Role> = find_roles(db, doc! { "_id": { "$in": role_ids } })
        .await?
        .into_iter()
        .map(|r| (r.id.to_string(), r))
        .collect();

    let mut by_user: HashMap<String, Vec<Role>> = HashMap::new();
    for link in links {
        if let Some(role) = roles.get(&link.role_id) {
            by_user.entry(link.user_id).or_default().push(role.clone());
        }
    }

    for user in users.iter_mut() {
        let mut roles = by_user.remove(&user.id.to_string()).unwrap_or_default();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        user.roles = roles;
    }

    Ok(())
}

/// Attach permissions to a batch of roles
pub(crate) async fn attach_permissions(db: &Database, roles: &mut [Role]) -> AppResult<()> {
    if roles.is_empty() {
        return Ok(());
    }

    let role_ids: Vec<String> = roles.iter().map(|r| r.id.to_string()).collect();
    let links: Vec<_> = documents::role_permissions(db)
        .find(doc! { "role_id": { "$in": role_ids } })
        .await
        .map_err(AppError::document("get role permissions"))?
        .try_collect()
        .await
        .map_err(AppError::document("get role permissions"))?;

    let permission_ids: Vec<String> = links.iter().map(|l| l.permission_id.clone()).collect();
    let permissions: HashMap<String, Permission> = find_permissions(
        db,
        doc! { "_id": { "$in": permission_ids } },
        doc! { "name": 1 },
    )
    .await?
    .into_iter()
    .map(|p| (p.id.to_string(), p))
    .collect();

    let mut by_role: HashMap<String, Vec<Permission>> = HashMap::new();
    for link in links {
        if let Some(permission) = permissions.get(&link.permission_id) {
            by_role.entry(link.role_id).or_default().push(permission.clone());
        }
    }

    for role in roles.iter_mut() {
        let mut permissions = by_role.remove(&role.id.to_string()).unwrap_or_default();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        role.permissions = permissions;
    }

    Ok(())
}

pub(crate) async fn find_user(db: &Database, filter: Document) -> AppResult<Option<User>> {
    let Some(document) = documents::users(db)
        .find_one(filter)
        .await
        .map_err(AppError::document("find user"))?
    else {
        return Ok(None);
    };

    let mut user = User::try_from(document)?;
    user.roles = roles_for_user(db, user.id).await?;
    Ok(Some(user))
}

pub(crate) async fn find_role(db: &Database, filter: Document) -> AppResult<Option<Role>> {
    let Some(document) = documents::roles(db)
        .find_one(filter)
        .await
        .map_err(AppError::document("find role"))?
    else {
        return Ok(None);
    };

    let mut role = Role::try_from(document)?;
    role.permissions = permissions_for_role(db, role.id).await?;
    Ok(Some(role))
}
