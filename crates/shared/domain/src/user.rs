//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::MAX_USERNAME_LENGTH;
use crate::error::{DomainError, DomainResult};
use crate::role::Role;

/// User domain entity.
///
/// `roles` is never persisted on the user record; repositories attach it at
/// read time from the `user_roles` association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl User {
    /// Names of the attached roles
    pub fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(|r| r.name.as_str()).collect()
    }

    /// Check whether an attached role carries the given name
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    /// The mutable profile fields of this user, for read-modify-write updates
    pub fn profile(&self) -> UserUpdate {
        UserUpdate {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            is_active: self.is_active,
        }
    }
}

/// Assignment of a role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a user. Id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

/// Full replacement of a user's profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

/// User creation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Plain text password (minimum 8 characters)
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

/// User update request. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    /// New plain text password
    pub password: Option<String>,
    /// Replaces every role assignment when present (an empty list clears them)
    pub role_ids: Option<Vec<Uuid>>,
}

impl UpdateUser {
    /// Apply the supplied profile fields on top of the current ones
    pub fn merge_into(&self, mut current: UserUpdate) -> UserUpdate {
        if let Some(username) = &self.username {
            current.username = username.clone();
        }
        if let Some(email) = &self.email {
            current.email = email.clone();
        }
        if let Some(first_name) = &self.first_name {
            current.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            current.last_name = last_name.clone();
        }
        if let Some(is_active) = self.is_active {
            current.is_active = is_active;
        }
        current
    }
}

/// Check the identity fields every stored user must satisfy.
pub fn validate_identity(username: &str, email: &str) -> DomainResult<()> {
    let username = username.trim();
    if username.is_empty() {
        return Err(DomainError::invalid_field("username", "is required"));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(DomainError::invalid_field(
            "username",
            format!("must be at most {} characters", MAX_USERNAME_LENGTH),
        ));
    }
    if !email.contains('@') {
        return Err(DomainError::invalid_field("email", "must contain @"));
    }
    Ok(())
}
