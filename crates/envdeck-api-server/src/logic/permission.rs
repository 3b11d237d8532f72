use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::{
    error::CommonError,
    primitives::{WrappedChronoDateTime, WrappedUuidV4},
};
use utoipa::ToSchema;

use crate::{
    logic::tier::EnvironmentTier,
    repository::{
        ApplicationRepositoryLike, CreatePermission, PermissionRepositoryLike, UserRepositoryLike,
    },
};

/// Capability row: the user may view the tier, either globally
/// (`application_id` is None) or scoped to one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Permission {
    pub id: WrappedUuidV4,
    pub user_id: WrappedUuidV4,
    pub tier: EnvironmentTier,
    pub application_id: Option<WrappedUuidV4>,
    pub created_at: WrappedChronoDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct GrantPermissionRequest {
    pub tier: EnvironmentTier,
    /// Omit to grant the tier globally.
    pub application_id: Option<WrappedUuidV4>,
}

pub type GrantPermissionResponse = Permission;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListPermissionsResponse {
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct RevokePermissionResponse {
    pub success: bool,
}

/// The capability check both download paths converge on.
///
/// Allowed iff the user holds the tier globally, or scoped to this
/// application. Replaces the stringly `view-<tier>` / `view-<tier>-<slug>`
/// permission names with an explicit (subject, tier, application) predicate.
pub async fn authorize_env_access<R: PermissionRepositoryLike>(
    repository: &R,
    user_id: &WrappedUuidV4,
    tier: EnvironmentTier,
    application_id: &WrappedUuidV4,
) -> Result<(), CommonError> {
    if repository.has_permission(user_id, tier, None).await? {
        return Ok(());
    }

    if repository
        .has_permission(user_id, tier, Some(application_id))
        .await?
    {
        return Ok(());
    }

    Err(CommonError::Authorization {
        msg: format!("user {user_id} may not view the {tier} environment of this application"),
        source: anyhow::anyhow!("capability check failed"),
    })
}

/// Gate for the management surface (user CRUD, grants, token issuance).
/// Only admins pass; without this an ordinary caller could grant
/// themselves a tier and walk around the download check.
pub async fn authorize_management<R: UserRepositoryLike>(
    repository: &R,
    actor_id: &WrappedUuidV4,
) -> Result<(), CommonError> {
    match repository.get_user_by_id(actor_id).await? {
        Some(actor) if actor.is_admin => Ok(()),
        _ => Err(CommonError::Authorization {
            msg: format!("user {actor_id} may not manage users, permissions or tokens"),
            source: anyhow::anyhow!("management capability check failed"),
        }),
    }
}

pub async fn grant_permission<R>(
    repository: &R,
    user_id: WrappedUuidV4,
    request: GrantPermissionRequest,
) -> Result<GrantPermissionResponse, CommonError>
where
    R: PermissionRepositoryLike + UserRepositoryLike + ApplicationRepositoryLike,
{
    let user = repository.get_user_by_id(&user_id).await?;
    if user.is_none() {
        return Err(CommonError::NotFound {
            msg: format!("User with id {user_id} not found"),
            lookup_id: user_id.to_string(),
            source: None,
        });
    }

    if let Some(application_id) = &request.application_id {
        let application = repository.get_application_by_id(application_id).await?;
        if application.is_none() {
            return Err(CommonError::NotFound {
                msg: format!("Application with id {application_id} not found"),
                lookup_id: application_id.to_string(),
                source: None,
            });
        }
    }

    if repository
        .has_permission(&user_id, request.tier, request.application_id.as_ref())
        .await?
    {
        return Err(CommonError::InvalidRequest {
            msg: "Permission already granted".to_string(),
            source: None,
        });
    }

    let permission = Permission {
        id: WrappedUuidV4::new(),
        user_id,
        tier: request.tier,
        application_id: request.application_id,
        created_at: WrappedChronoDateTime::now(),
    };

    let create_params = CreatePermission {
        id: permission.id,
        user_id: permission.user_id,
        tier: permission.tier,
        application_id: permission.application_id,
        created_at: permission.created_at,
    };

    repository.create_permission(&create_params).await?;

    Ok(permission)
}

pub async fn revoke_permission<R: PermissionRepositoryLike>(
    repository: &R,
    user_id: WrappedUuidV4,
    permission_id: WrappedUuidV4,
) -> Result<RevokePermissionResponse, CommonError> {
    let existing = repository.get_permission_by_id(&permission_id).await?;
    let existing = existing.ok_or_else(|| CommonError::NotFound {
        msg: format!("Permission with id {permission_id} not found"),
        lookup_id: permission_id.to_string(),
        source: None,
    })?;

    if existing.user_id != user_id {
        return Err(CommonError::NotFound {
            msg: format!("Permission with id {permission_id} not found for user {user_id}"),
            lookup_id: permission_id.to_string(),
            source: None,
        });
    }

    repository.delete_permission(&permission_id).await?;

    Ok(RevokePermissionResponse { success: true })
}

pub async fn list_permissions<R: PermissionRepositoryLike>(
    repository: &R,
    user_id: WrappedUuidV4,
) -> Result<ListPermissionsResponse, CommonError> {
    let permissions = repository.get_permissions_for_user(&user_id).await?;

    Ok(ListPermissionsResponse { permissions })
}

#[cfg(test)]
mod unit_test {
    use super::*;
    use crate::logic::application::{CreateApplicationRequest, create_application};
    use crate::logic::user::{CreateUserRequest, create_user};
    use crate::repository::Repository;
    use shared::primitives::SqlMigrationLoader;

    async fn setup_test_repository() -> (libsql::Database, Repository) {
        let (db, conn) = shared::test_utils::repository::setup_in_memory_database(vec![
            <Repository as SqlMigrationLoader>::load_sql_migrations(),
        ])
        .await
        .expect("Failed to setup test database");
        (db, Repository::new(conn))
    }

    async fn seed_user(repository: &Repository, name: &str) -> WrappedUuidV4 {
        create_user(
            repository,
            CreateUserRequest {
                name: name.to_string(),
                email: None,
                is_admin: false,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn seed_application(repository: &Repository, name: &str) -> WrappedUuidV4 {
        create_application(
            repository,
            None,
            CreateApplicationRequest {
                name: name.to_string(),
                slug: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_global_permission_allows_any_application() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user(&repository, "ops").await;
        let billing = seed_application(&repository, "Billing").await;
        let shipping = seed_application(&repository, "Shipping").await;

        grant_permission(
            &repository,
            user_id,
            GrantPermissionRequest {
                tier: EnvironmentTier::Production,
                application_id: None,
            },
        )
        .await
        .unwrap();

        assert!(
            authorize_env_access(&repository, &user_id, EnvironmentTier::Production, &billing)
                .await
                .is_ok()
        );
        assert!(
            authorize_env_access(
                &repository,
                &user_id,
                EnvironmentTier::Production,
                &shipping
            )
            .await
            .is_ok()
        );
    }

    #[tokio::test]
    async fn test_scoped_permission_only_covers_its_application() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user(&repository, "dev").await;
        let billing = seed_application(&repository, "Billing").await;
        let shipping = seed_application(&repository, "Shipping").await;

        grant_permission(
            &repository,
            user_id,
            GrantPermissionRequest {
                tier: EnvironmentTier::Staging,
                application_id: Some(billing),
            },
        )
        .await
        .unwrap();

        assert!(
            authorize_env_access(&repository, &user_id, EnvironmentTier::Staging, &billing)
                .await
                .is_ok()
        );

        let denied =
            authorize_env_access(&repository, &user_id, EnvironmentTier::Staging, &shipping).await;
        assert!(denied.is_err());
        match denied.unwrap_err() {
            CommonError::Authorization { .. } => {}
            e => panic!("Expected Authorization error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_permission_is_tier_specific() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user(&repository, "dev").await;
        let billing = seed_application(&repository, "Billing").await;

        grant_permission(
            &repository,
            user_id,
            GrantPermissionRequest {
                tier: EnvironmentTier::Staging,
                application_id: Some(billing),
            },
        )
        .await
        .unwrap();

        let denied =
            authorize_env_access(&repository, &user_id, EnvironmentTier::Production, &billing)
                .await;
        assert!(denied.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_grant_rejected() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user(&repository, "ops").await;

        let request = GrantPermissionRequest {
            tier: EnvironmentTier::Development,
            application_id: None,
        };

        grant_permission(&repository, user_id, request.clone())
            .await
            .unwrap();
        let result = grant_permission(&repository, user_id, request).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::InvalidRequest { .. } => {}
            e => panic!("Expected InvalidRequest error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_revoke_permission() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user(&repository, "ops").await;
        let billing = seed_application(&repository, "Billing").await;

        let granted = grant_permission(
            &repository,
            user_id,
            GrantPermissionRequest {
                tier: EnvironmentTier::Staging,
                application_id: Some(billing),
            },
        )
        .await
        .unwrap();

        revoke_permission(&repository, user_id, granted.id)
            .await
            .unwrap();

        let denied =
            authorize_env_access(&repository, &user_id, EnvironmentTier::Staging, &billing).await;
        assert!(denied.is_err());

        let listed = list_permissions(&repository, user_id).await.unwrap();
        assert!(listed.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_only_admins_pass_the_management_gate() {
        let (_db, repository) = setup_test_repository().await;
        let member = seed_user(&repository, "member").await;

        let admin = create_user(
            &repository,
            CreateUserRequest {
                name: "root".to_string(),
                email: None,
                is_admin: true,
            },
        )
        .await
        .unwrap()
        .id;

        assert!(authorize_management(&repository, &admin).await.is_ok());

        let denied = authorize_management(&repository, &member).await;
        assert!(denied.is_err());
        match denied.unwrap_err() {
            CommonError::Authorization { .. } => {}
            e => panic!("Expected Authorization error, got: {e:?}"),
        }

        // Unknown actors are denied too
        let unknown = WrappedUuidV4::new();
        assert!(authorize_management(&repository, &unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_revoke_other_users_permission_not_found() {
        let (_db, repository) = setup_test_repository().await;
        let owner = seed_user(&repository, "owner").await;
        let other = seed_user(&repository, "other").await;

        let granted = grant_permission(
            &repository,
            owner,
            GrantPermissionRequest {
                tier: EnvironmentTier::Development,
                application_id: None,
            },
        )
        .await
        .unwrap();

        let result = revoke_permission(&repository, other, granted.id).await;
        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::NotFound { .. } => {}
            e => panic!("Expected NotFound error, got: {e:?}"),
        }
    }
}
