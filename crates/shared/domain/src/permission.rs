//! Permission domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::permission_name;

/// An action allowed on a resource. The (resource, action) pair is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

/// Grant of a permission to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
}

impl NewPermission {
    /// Permission named after its pair, e.g. `doc:read`
    pub fn for_pair(resource: &str, action: &str, description: impl Into<String>) -> Self {
        Self {
            name: permission_name(resource, action),
            resource: resource.to_string(),
            action: action.to_string(),
            description: description.into(),
        }
    }
}

/// Full replacement of a permission's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionUpdate {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
}

/// Permission creation request. A missing name defaults to `resource:action`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePermission {
    pub name: Option<String>,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
}

impl From<CreatePermission> for NewPermission {
    fn from(request: CreatePermission) -> Self {
        let name = request
            .name
            .unwrap_or_else(|| permission_name(&request.resource, &request.action));
        Self {
            name,
            resource: request.resource,
            action: request.action,
            description: request.description,
        }
    }
}

/// Permission update request. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePermission {
    pub name: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub description: Option<String>,
}

impl UpdatePermission {
    pub fn merge_into(&self, permission: &Permission) -> PermissionUpdate {
        PermissionUpdate {
            name: self.name.clone().unwrap_or_else(|| permission.name.clone()),
            resource: self
                .resource
                .clone()
                .unwrap_or_else(|| permission.resource.clone()),
            action: self.action.clone().unwrap_or_else(|| permission.action.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| permission.description.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults_name_to_pair() {
        let new: NewPermission = CreatePermission {
            name: None,
            resource: "doc".to_string(),
            action: "read".to_string(),
            description: String::new(),
        }
        .into();

        assert_eq!(new.name, "doc:read");
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let now = Utc::now();
        let permission = Permission {
            id: Uuid::new_v4(),
            name: "doc:read".to_string(),
            resource: "doc".to_string(),
            action: "read".to_string(),
            description: "Read documents".to_string(),
            created_at: now,
            updated_at: now,
        };

        let update = UpdatePermission {
            description: Some("Read any document".to_string()),
            ..Default::default()
        }
        .merge_into(&permission);

        assert_eq!(update.resource, "doc");
        assert_eq!(update.description, "Read any document");
        assert!(permission.matches("doc", "read"));
        assert!(!permission.matches("doc", "write"));
    }
}
