//! End-to-end flows through the services, relational backend and cache.

mod support;

use domain::{CreatePermission, CreateRole, UpdateRole, UpdateUser, ROLE_ADMIN};
use user_service_lib::cache::keys;
use user_service_lib::infra::seed_defaults;

use crate::support::{create_user, sqlite_services, TEST_PASSWORD};

fn create_role(name: &str, permission_ids: Vec<uuid::Uuid>) -> CreateRole {
    CreateRole {
        name: name.to_string(),
        description: String::new(),
        permission_ids,
    }
}

#[tokio::test]
async fn test_role_reassignment_is_visible_after_update() {
    let (repos, services) = sqlite_services().await;
    let first = services.roles().create_role(create_role("r1", vec![])).await.unwrap();
    let second = services.roles().create_role(create_role("r2", vec![])).await.unwrap();

    let user = services
        .users()
        .create_user(create_user("ursula", vec![first.id]))
        .await
        .unwrap();

    let fetched = services.users().get_user(user.id).await.unwrap();
    assert_eq!(fetched.role_names(), vec!["r1"]);
    assert!(repos
        .cache
        .get::<serde_json::Value>(&keys::user(user.id))
        .await
        .unwrap()
        .is_some());

    let update = UpdateUser {
        first_name: Some("Ursula".to_string()),
        role_ids: Some(vec![second.id]),
        ..Default::default()
    };
    services.users().update_user(user.id, update).await.unwrap();

    let fetched = services.users().get_user(user.id).await.unwrap();
    assert_eq!(fetched.role_names(), vec!["r2"]);
    assert_eq!(fetched.first_name, "Ursula");
}

#[tokio::test]
async fn test_permission_delete_revokes_access() {
    let (repos, services) = sqlite_services().await;
    let permission = services
        .permissions()
        .create_permission(CreatePermission {
            name: None,
            resource: "doc".to_string(),
            action: "read".to_string(),
            description: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(permission.name, "doc:read");

    let reader = services
        .roles()
        .create_role(create_role("reader", vec![]))
        .await
        .unwrap();
    services
        .roles()
        .assign_permissions(reader.id, vec![permission.id])
        .await
        .unwrap();
    let user = services
        .users()
        .create_user(create_user("paula", vec![reader.id]))
        .await
        .unwrap();

    assert!(services.users().has_permission(user.id, "doc", "read").await.unwrap());
    let key = keys::user_has_permission(user.id, "doc", "read");
    assert_eq!(repos.cache.get::<bool>(&key).await.unwrap(), Some(true));

    services.permissions().delete_permission(permission.id).await.unwrap();

    assert_eq!(repos.cache.get::<bool>(&key).await.unwrap(), None);
    assert!(!services.users().has_permission(user.id, "doc", "read").await.unwrap());
}

#[tokio::test]
async fn test_create_user_with_unknown_role_persists_nothing() {
    let (_repos, services) = sqlite_services().await;

    let result = services
        .users()
        .create_user(create_user("ghost", vec![uuid::Uuid::new_v4()]))
        .await;

    assert!(result.is_err());
    assert!(services
        .users()
        .get_user_by_username("ghost")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_duplicate_username_is_conflict() {
    let (_repos, services) = sqlite_services().await;
    services
        .users()
        .create_user(create_user("dup", vec![]))
        .await
        .unwrap();

    let err = services
        .users()
        .create_user(create_user("dup", vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.root().code(), "CONFLICT");
}

#[tokio::test]
async fn test_change_password_checks_current() {
    let (_repos, services) = sqlite_services().await;
    let user = services
        .users()
        .create_user(create_user("pat", vec![]))
        .await
        .unwrap();

    let err = services
        .users()
        .change_password(user.id, "wrong-password", "another-password")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    services
        .users()
        .change_password(user.id, TEST_PASSWORD, "another-password")
        .await
        .unwrap();
    services
        .users()
        .change_password(user.id, "another-password", TEST_PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_role_grant_update_reaches_users() {
    let (_repos, services) = sqlite_services().await;
    let permission = services
        .permissions()
        .create_permission(CreatePermission {
            name: None,
            resource: "report".to_string(),
            action: "export".to_string(),
            description: String::new(),
        })
        .await
        .unwrap();
    let role = services
        .roles()
        .create_role(create_role("analyst", vec![]))
        .await
        .unwrap();
    let user = services
        .users()
        .create_user(create_user("quinn", vec![role.id]))
        .await
        .unwrap();
    assert!(services.users().get_user_permissions(user.id).await.unwrap().is_empty());

    let update = UpdateRole {
        permission_ids: Some(vec![permission.id]),
        ..Default::default()
    };
    let role = services.roles().update_role(role.id, update).await.unwrap();
    assert_eq!(role.permissions.len(), 1);

    let permissions = services.users().get_user_permissions(user.id).await.unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].id, permission.id);
}

#[tokio::test]
async fn test_list_users_reports_total() {
    let (_repos, services) = sqlite_services().await;
    for name in ["ann", "ben", "cat"] {
        services
            .users()
            .create_user(create_user(name, vec![]))
            .await
            .unwrap();
    }

    let page = services.users().list_users(2, 0).await.unwrap();
    assert_eq!(page.users.len(), 2);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn test_seeding_is_idempotent() {
    let (repos, services) = sqlite_services().await;

    let first = seed_defaults(&repos, Some(TEST_PASSWORD)).await.unwrap();
    assert_eq!(first.roles_created, 4);
    assert_eq!(first.permissions_created, 9);
    assert!(first.admin_created);

    let second = seed_defaults(&repos, Some(TEST_PASSWORD)).await.unwrap();
    assert!(second.is_empty());

    let admin = services.users().get_user_by_username("admin").await.unwrap();
    assert!(admin.has_role(ROLE_ADMIN));
    assert!(services
        .users()
        .has_permission(admin.id, "permission", "delete")
        .await
        .unwrap());

    let admin_role = services.roles().get_role_by_name(ROLE_ADMIN).await.unwrap();
    assert_eq!(admin_role.permissions.len(), 9);
}
