use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::{
    error::CommonError,
    primitives::{WrappedChronoDateTime, WrappedUuidV4},
};
use utoipa::ToSchema;

use crate::repository::{AccessTokenRepositoryLike, CreateAccessToken, UserRepositoryLike};

/// Bearer credential for a user. The token value doubles as the share
/// secret embedded in download links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct AccessToken {
    pub id: WrappedUuidV4,
    pub user_id: WrappedUuidV4,
    pub name: String,
    pub token: String,
    pub created_at: WrappedChronoDateTime,
    pub last_used_at: Option<WrappedChronoDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct IssueAccessTokenRequest {
    /// Label shown when listing tokens, e.g. "ci" or "laptop".
    pub name: String,
}

pub type IssueAccessTokenResponse = AccessToken;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListAccessTokensResponse {
    pub tokens: Vec<AccessToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct RevokeAccessTokenResponse {
    pub success: bool,
}

/// 64 hex characters of random. Uuids are already backed by the OS rng,
/// so two of them concatenated give the full width without pulling in a
/// separate rng dependency.
fn generate_token_value() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub async fn issue_access_token<R>(
    repository: &R,
    user_id: WrappedUuidV4,
    request: IssueAccessTokenRequest,
) -> Result<IssueAccessTokenResponse, CommonError>
where
    R: AccessTokenRepositoryLike + UserRepositoryLike,
{
    let user = repository.get_user_by_id(&user_id).await?;
    if user.is_none() {
        return Err(CommonError::NotFound {
            msg: format!("User with id {user_id} not found"),
            lookup_id: user_id.to_string(),
            source: None,
        });
    }

    if request.name.trim().is_empty() {
        return Err(CommonError::InvalidRequest {
            msg: "Token name must not be empty".to_string(),
            source: None,
        });
    }

    let access_token = AccessToken {
        id: WrappedUuidV4::new(),
        user_id,
        name: request.name,
        token: generate_token_value(),
        created_at: WrappedChronoDateTime::now(),
        last_used_at: None,
    };

    let create_params = CreateAccessToken {
        id: access_token.id,
        user_id: access_token.user_id,
        name: access_token.name.clone(),
        token: access_token.token.clone(),
        created_at: access_token.created_at,
    };

    repository.create_access_token(&create_params).await?;

    Ok(access_token)
}

/// Resolve a presented token value to its owning token row.
///
/// Misses come back as `InvalidToken` rather than `NotFound`; a bad token
/// is an authorization problem, not a missing resource, and the message
/// deliberately says nothing about whether such a token ever existed.
pub async fn resolve_access_token<R: AccessTokenRepositoryLike>(
    repository: &R,
    token_value: &str,
) -> Result<AccessToken, CommonError> {
    let access_token = repository.get_access_token_by_value(token_value).await?;
    let access_token = access_token.ok_or_else(|| CommonError::InvalidToken {
        msg: "invalid token.".to_string(),
        source: None,
    })?;

    repository
        .touch_access_token(&access_token.id, &WrappedChronoDateTime::now())
        .await?;

    Ok(access_token)
}

pub async fn revoke_access_token<R: AccessTokenRepositoryLike>(
    repository: &R,
    user_id: WrappedUuidV4,
    token_id: WrappedUuidV4,
) -> Result<RevokeAccessTokenResponse, CommonError> {
    let existing = repository.get_access_token_by_id(&token_id).await?;
    let existing = existing.ok_or_else(|| CommonError::NotFound {
        msg: format!("Access token with id {token_id} not found"),
        lookup_id: token_id.to_string(),
        source: None,
    })?;

    if existing.user_id != user_id {
        return Err(CommonError::NotFound {
            msg: format!("Access token with id {token_id} not found for user {user_id}"),
            lookup_id: token_id.to_string(),
            source: None,
        });
    }

    repository.delete_access_token(&token_id).await?;

    Ok(RevokeAccessTokenResponse { success: true })
}

pub async fn list_access_tokens<R: AccessTokenRepositoryLike>(
    repository: &R,
    user_id: WrappedUuidV4,
) -> Result<ListAccessTokensResponse, CommonError> {
    let tokens = repository.get_access_tokens_for_user(&user_id).await?;

    Ok(ListAccessTokensResponse { tokens })
}

#[cfg(test)]
mod unit_test {
    use super::*;
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

    #[test]
    fn test_generated_tokens_are_long_and_unique() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_issue_and_resolve_token() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user(&repository, "ops").await;

        let issued = issue_access_token(
            &repository,
            user_id,
            IssueAccessTokenRequest {
                name: "ci".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(issued.last_used_at.is_none());

        let resolved = resolve_access_token(&repository, &issued.token)
            .await
            .unwrap();
        assert_eq!(resolved.id, issued.id);
        assert_eq!(resolved.user_id, user_id);

        // Resolution stamps last_used_at
        let listed = list_access_tokens(&repository, user_id).await.unwrap();
        assert_eq!(listed.tokens.len(), 1);
        assert!(listed.tokens[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_resolve_unknown_token_is_invalid_token() {
        let (_db, repository) = setup_test_repository().await;

        let result = resolve_access_token(&repository, "deadbeef").await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::InvalidToken { .. } => {}
            e => panic!("Expected InvalidToken error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_revoked_token_no_longer_resolves() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user(&repository, "ops").await;

        let issued = issue_access_token(
            &repository,
            user_id,
            IssueAccessTokenRequest {
                name: "ci".to_string(),
            },
        )
        .await
        .unwrap();

        revoke_access_token(&repository, user_id, issued.id)
            .await
            .unwrap();

        let result = resolve_access_token(&repository, &issued.token).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_revoke_other_users_token_not_found() {
        let (_db, repository) = setup_test_repository().await;
        let owner = seed_user(&repository, "owner").await;
        let other = seed_user(&repository, "other").await;

        let issued = issue_access_token(
            &repository,
            owner,
            IssueAccessTokenRequest {
                name: "ci".to_string(),
            },
        )
        .await
        .unwrap();

        let result = revoke_access_token(&repository, other, issued.id).await;
        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::NotFound { .. } => {}
            e => panic!("Expected NotFound error, got: {e:?}"),
        }
    }
}
