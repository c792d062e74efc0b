//! Default role, permission and administrator seeding.
//!
//! Safe to run on every start: anything already present (matched by role
//! name, resource/action pair or username) is left as it is.

use uuid::Uuid;

use common::AppResult;
use domain::{
    permission_name, NewPermission, NewRole, NewUser, Password, DEFAULT_ACTIONS,
    DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_USERNAME, DEFAULT_RESOURCES, DEFAULT_ROLES, ROLE_ADMIN,
};

use crate::cache::CacheScope;
use crate::repository::Repositories;

/// What a seeding run created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: usize,
    pub permissions_created: usize,
    pub admin_created: bool,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.roles_created == 0 && self.permissions_created == 0 && !self.admin_created
    }
}

/// Seed the default catalogue, and the admin account when a password is given.
pub async fn seed_defaults(repos: &Repositories, admin_password: Option<&str>) -> AppResult<SeedReport> {
    let mut report = SeedReport::default();

    let mut admin_role_id = None;
    let mut admin_role_created = false;
    for (name, description) in DEFAULT_ROLES {
        let role = match repos.roles.find_by_name(name).await? {
            Some(role) => role,
            None => {
                let new = NewRole {
                    name: name.to_string(),
                    description: description.to_string(),
                };
                let role = repos
                    .tx
                    .execute_tx(move |repo| Box::pin(async move { repo.create_role(new).await }))
                    .await?;
                report.roles_created += 1;
                admin_role_created |= role.name == ROLE_ADMIN;
                role
            }
        };
        if role.name == ROLE_ADMIN {
            admin_role_id = Some(role.id);
        }
    }

    let mut permission_ids: Vec<Uuid> = Vec::new();
    for resource in DEFAULT_RESOURCES {
        for action in DEFAULT_ACTIONS {
            let permission = match repos.permissions.find_by_resource_action(resource, action).await? {
                Some(permission) => permission,
                None => {
                    let new = NewPermission::for_pair(
                        resource,
                        action,
                        format!("Allows {} on {}", action, resource),
                    );
                    let permission = repos
                        .tx
                        .execute_tx(move |repo| {
                            Box::pin(async move { repo.create_permission(new).await })
                        })
                        .await?;
                    tracing::debug!(name = %permission_name(resource, action), "Seeded permission");
                    report.permissions_created += 1;
                    permission
                }
            };
            permission_ids.push(permission.id);
        }
    }

    if let Some(role_id) = admin_role_id {
        if admin_role_created || report.permissions_created > 0 {
            let mut granted: Vec<Uuid> = repos
                .roles
                .get_role_permissions(role_id)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();
            granted.extend(permission_ids.iter().copied());

            repos
                .tx
                .execute_tx(move |repo| {
                    Box::pin(async move { repo.replace_role_permissions(role_id, granted).await })
                })
                .await?;
        }
    }

    if let (Some(password), Some(role_id)) = (admin_password, admin_role_id) {
        if repos.users.find_by_username(DEFAULT_ADMIN_USERNAME).await?.is_none() {
            let password = Password::new(password)?;
            let new = NewUser {
                username: DEFAULT_ADMIN_USERNAME.to_string(),
                email: DEFAULT_ADMIN_EMAIL.to_string(),
                password_hash: password.into_string(),
                first_name: "System".to_string(),
                last_name: "Administrator".to_string(),
                is_active: true,
            };

            repos
                .tx
                .execute_tx(move |repo| {
                    Box::pin(async move {
                        let user = repo.create_user(new).await?;
                        repo.replace_user_roles(user.id, vec![role_id]).await?;
                        Ok(user)
                    })
                })
                .await?;
            report.admin_created = true;
        }
    }

    if !report.is_empty() {
        repos.cache.invalidate(CacheScope::PERMISSION_GRAPH).await;
        repos.cache.invalidate(&[CacheScope::Users]).await;
    }

    tracing::info!(
        roles = report.roles_created,
        permissions = report.permissions_created,
        admin = report.admin_created,
        "Default data seeded"
    );

    Ok(report)
}
