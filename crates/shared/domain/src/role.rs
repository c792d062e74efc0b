//! Role domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::Permission;

/// Named bundle of permissions. `permissions` is attached at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Check whether an attached permission grants `action` on `resource`
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(resource, action))
    }
}

/// Fields needed to insert a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: String,
}

/// Full replacement of a role's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleUpdate {
    pub name: String,
    pub description: String,
}

/// Role creation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

/// Role update request. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replaces every permission grant when present
    pub permission_ids: Option<Vec<Uuid>>,
}

impl UpdateRole {
    pub fn merge_into(&self, role: &Role) -> RoleUpdate {
        RoleUpdate {
            name: self.name.clone().unwrap_or_else(|| role.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| role.description.clone()),
        }
    }
}
