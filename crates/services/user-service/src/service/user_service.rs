//! User service - Handles user-related business logic.
//!
//! Uniqueness of username and email is left to the store: a duplicate
//! surfaces as `Conflict` from the insert or update itself.

use async_trait::async_trait;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::user::validate_identity;
use domain::{
    CreateUser, NewUser, Password, Permission, UpdateUser, User, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

use crate::cache::CacheScope;
use crate::repository::Repositories;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A page of users together with the total across all pages.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// User service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create a user and assign its roles in one transaction
    async fn create_user(&self, request: CreateUser) -> AppResult<User>;

    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    async fn get_user_by_username(&self, username: &str) -> AppResult<User>;

    /// Page of users; a zero limit means the default page size
    async fn list_users(&self, limit: u64, offset: u64) -> AppResult<UserPage>;

    /// Apply profile, password and role changes in one transaction
    async fn update_user(&self, id: Uuid, request: UpdateUser) -> AppResult<User>;

    /// Replace the password after checking the current one
    async fn change_password(&self, id: Uuid, current: &str, new: &str) -> AppResult<()>;

    async fn delete_user(&self, id: Uuid) -> AppResult<()>;

    async fn assign_roles(&self, id: Uuid, role_ids: Vec<Uuid>) -> AppResult<User>;

    async fn get_user_permissions(&self, id: Uuid) -> AppResult<Vec<Permission>>;

    async fn has_permission(&self, id: Uuid, resource: &str, action: &str) -> AppResult<bool>;
}

/// Concrete implementation of UserService over the repositories.
pub struct UserManager {
    repos: Repositories,
}

impl UserManager {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    async fn invalidate_users(&self) {
        self.repos.cache.invalidate(&[CacheScope::Users]).await;
    }
}

fn page_bounds(limit: u64) -> u64 {
    match limit {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

#[async_trait]
impl UserService for UserManager {
    async fn create_user(&self, request: CreateUser) -> AppResult<User> {
        validate_identity(&request.username, &request.email)?;
        let password = Password::new(&request.password)?;

        let new = NewUser {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash: password.into_string(),
            first_name: request.first_name,
            last_name: request.last_name,
            is_active: true,
        };
        let role_ids = request.role_ids;

        let mut user = self
            .repos
            .tx
            .execute_tx(move |repo| {
                Box::pin(async move {
                    let user = repo.create_user(new).await?;
                    if !role_ids.is_empty() {
                        repo.replace_user_roles(user.id, role_ids).await?;
                    }
                    Ok(user)
                })
            })
            .await?;
        self.invalidate_users().await;

        user.roles = self.repos.users.get_user_roles(user.id).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.repos.users.find_by_id(id).await?.ok_or_not_found("user")
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        self.repos
            .users
            .find_by_username(username)
            .await?
            .ok_or_not_found("user")
    }

    async fn list_users(&self, limit: u64, offset: u64) -> AppResult<UserPage> {
        let limit = page_bounds(limit);
        let (users, total) = tokio::try_join!(
            self.repos.users.list(limit, offset),
            self.repos.users.count()
        )?;

        Ok(UserPage {
            users,
            total,
            limit,
            offset,
        })
    }

    async fn update_user(&self, id: Uuid, request: UpdateUser) -> AppResult<User> {
        let current = self.get_user(id).await?;
        let profile = request.merge_into(current.profile());
        validate_identity(&profile.username, &profile.email)?;

        let password_hash = match &request.password {
            Some(plain) => Some(Password::new(plain)?.into_string()),
            None => None,
        };
        let role_ids = request.role_ids;

        self.repos
            .tx
            .execute_tx(move |repo| {
                Box::pin(async move {
                    repo.update_user(id, profile).await?;
                    if let Some(hash) = password_hash {
                        repo.update_user_password(id, hash).await?;
                    }
                    if let Some(role_ids) = role_ids {
                        repo.replace_user_roles(id, role_ids).await?;
                    }
                    Ok(())
                })
            })
            .await?;
        self.invalidate_users().await;

        self.get_user(id).await
    }

    async fn change_password(&self, id: Uuid, current: &str, new: &str) -> AppResult<()> {
        let user = self.get_user(id).await?;
        if !Password::from_hash(user.password_hash).verify(current) {
            return Err(AppError::validation("current password is incorrect"));
        }

        let password = Password::new(new)?;
        self.repos
            .users
            .update_password(id, password.into_string())
            .await
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        self.repos.users.delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn assign_roles(&self, id: Uuid, role_ids: Vec<Uuid>) -> AppResult<User> {
        // Existence check keeps a missing user from reading as an empty assignment
        self.get_user(id).await?;
        self.repos.users.assign_roles(id, role_ids).await?;
        self.get_user(id).await
    }

    async fn get_user_permissions(&self, id: Uuid) -> AppResult<Vec<Permission>> {
        self.repos.users.get_user_permissions(id).await
    }

    async fn has_permission(&self, id: Uuid, resource: &str, action: &str) -> AppResult<bool> {
        self.repos.users.has_permission(id, resource, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(0), DEFAULT_PAGE_SIZE);
        assert_eq!(page_bounds(25), 25);
        assert_eq!(page_bounds(10_000), MAX_PAGE_SIZE);
    }
}
