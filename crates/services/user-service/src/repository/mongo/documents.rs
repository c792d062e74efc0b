//! Document shapes stored in MongoDB.
//!
//! Ids are application-assigned UUID strings rather than store-native
//! ObjectIds, so both backends hand out the same kind of identifier.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{Permission, Role, RolePermission, User, UserRole};

pub const USERS: &str = "users";
pub const ROLES: &str = "roles";
pub const PERMISSIONS: &str = "permissions";
pub const USER_ROLES: &str = "user_roles";
pub const ROLE_PERMISSIONS: &str = "role_permissions";

/// Current time at the millisecond precision BSON dates keep.
pub fn now() -> DateTime<Utc> {
    bson::DateTime::now().to_chrono()
}

pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::internal(format!("malformed stored id {raw:?}: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserDocument> for User {
    type Error = AppError;

    fn try_from(doc: UserDocument) -> AppResult<Self> {
        Ok(User {
            id: parse_id(&doc.id)?,
            username: doc.username,
            email: doc.email,
            password_hash: doc.password_hash,
            first_name: doc.first_name,
            last_name: doc.last_name,
            is_active: doc.is_active,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            roles: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RoleDocument> for Role {
    type Error = AppError;

    fn try_from(doc: RoleDocument) -> AppResult<Self> {
        Ok(Role {
            id: parse_id(&doc.id)?,
            name: doc.name,
            description: doc.description,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            permissions: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PermissionDocument> for Permission {
    type Error = AppError;

    fn try_from(doc: PermissionDocument) -> AppResult<Self> {
        Ok(Permission {
            id: parse_id(&doc.id)?,
            name: doc.name,
            resource: doc.resource,
            action: doc.action,
            description: doc.description,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }
}

/// Association document; `_id` is left to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleDocument {
    pub user_id: String,
    pub role_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<UserRole> for UserRoleDocument {
    fn from(link: UserRole) -> Self {
        Self {
            user_id: link.user_id.to_string(),
            role_id: link.role_id.to_string(),
            created_at: link.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissionDocument {
    pub role_id: String,
    pub permission_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<RolePermission> for RolePermissionDocument {
    fn from(link: RolePermission) -> Self {
        Self {
            role_id: link.role_id.to_string(),
            permission_id: link.permission_id.to_string(),
            created_at: link.created_at,
        }
    }
}

pub fn users(db: &Database) -> Collection<UserDocument> {
    db.collection(USERS)
}

pub fn roles(db: &Database) -> Collection<RoleDocument> {
    db.collection(ROLES)
}

pub fn permissions(db: &Database) -> Collection<PermissionDocument> {
    db.collection(PERMISSIONS)
}

pub fn user_roles(db: &Database) -> Collection<UserRoleDocument> {
    db.collection(USER_ROLES)
}

pub fn role_permissions(db: &Database) -> Collection<RolePermissionDocument> {
    db.collection(ROLE_PERMISSIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_document_field_names() {
        let id = Uuid::new_v4();
        let doc = UserDocument {
            id: id.to_string(),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            is_active: true,
            created_at: now(),
            updated_at: now(),
        };

        let raw = bson::to_document(&doc).unwrap();
        assert_eq!(raw.get_str("_id").unwrap(), id.to_string());
        assert_eq!(raw.get_str("password").unwrap(), "hash");
        assert!(raw.get_datetime("created_at").is_ok());

        let user = User::try_from(doc).unwrap();
        assert_eq!(user.id, id);
        assert!(user.roles.is_empty());
    }

    #[test]
    fn test_malformed_id_is_internal_error() {
        let doc = RoleDocument {
            id: "not-a-uuid".to_string(),
            name: "admin".to_string(),
            description: String::new(),
            created_at: now(),
            updated_at: now(),
        };

        assert!(matches!(Role::try_from(doc), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_link_documents_store_string_ids() {
        let user_id = Uuid::new_v4();
        let role_id = Uuid::new_v4();
        let created_at = now();

        let link = UserRoleDocument::from(UserRole {
            user_id,
            role_id,
            created_at,
        });

        assert_eq!(link.user_id, user_id.to_string());
        assert_eq!(link.role_id, role_id.to_string());
        assert_eq!(link.created_at, created_at);

        let raw = bson::to_document(&link).unwrap();
        assert_eq!(raw.get_str("role_id").unwrap(), role_id.to_string());
        assert!(raw.get_datetime("created_at").is_ok());
    }
}
