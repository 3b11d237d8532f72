//! Bearer-token authentication for the HTTP surface.

use axum::http::HeaderMap;
use shared::{error::CommonError, primitives::WrappedUuidV4};

use crate::{
    logic::{access_token::resolve_access_token, permission::authorize_management},
    repository::{AccessTokenRepositoryLike, UserRepositoryLike},
};

/// Pull the bearer token out of the `Authorization` header, if any.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the caller to a user id. A missing header is an authentication
/// failure; an unresolvable token is an invalid-token failure.
pub async fn authenticate<R: AccessTokenRepositoryLike>(
    repository: &R,
    headers: &HeaderMap,
) -> Result<WrappedUuidV4, CommonError> {
    let token = extract_bearer_token(headers).ok_or_else(|| CommonError::Authentication {
        msg: "missing bearer token".to_string(),
        source: None,
    })?;

    let access_token = resolve_access_token(repository, token).await?;
    Ok(access_token.user_id)
}

/// Like [`authenticate`] but tolerates anonymous callers. A present but
/// unresolvable token still fails; silently ignoring a bad credential
/// would make typos indistinguishable from anonymity.
pub async fn authenticate_optional<R: AccessTokenRepositoryLike>(
    repository: &R,
    headers: &HeaderMap,
) -> Result<Option<WrappedUuidV4>, CommonError> {
    match extract_bearer_token(headers) {
        Some(token) => {
            let access_token = resolve_access_token(repository, token).await?;
            Ok(Some(access_token.user_id))
        }
        None => Ok(None),
    }
}

/// Resolve the caller and require the management capability. The gate for
/// every endpoint that mutates users, permissions or access tokens.
pub async fn authenticate_manager<R>(
    repository: &R,
    headers: &HeaderMap,
) -> Result<WrappedUuidV4, CommonError>
where
    R: AccessTokenRepositoryLike + UserRepositoryLike,
{
    let actor_id = authenticate(repository, headers).await?;
    authorize_management(repository, &actor_id).await?;
    Ok(actor_id)
}

/// Like [`authenticate_manager`] but lets users act on their own account,
/// so anyone can mint and revoke their own tokens.
pub async fn authenticate_self_or_manager<R>(
    repository: &R,
    headers: &HeaderMap,
    target_user_id: &WrappedUuidV4,
) -> Result<WrappedUuidV4, CommonError>
where
    R: AccessTokenRepositoryLike + UserRepositoryLike,
{
    let actor_id = authenticate(repository, headers).await?;
    if actor_id == *target_user_id {
        return Ok(actor_id);
    }
    authorize_management(repository, &actor_id).await?;
    Ok(actor_id)
}

#[cfg(test)]
mod unit_test {
    use super::*;
    use crate::logic::access_token::{IssueAccessTokenRequest, issue_access_token};
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

    async fn seed_user_with_token(
        repository: &Repository,
        name: &str,
        is_admin: bool,
    ) -> (WrappedUuidV4, HeaderMap) {
        let user = create_user(
            repository,
            CreateUserRequest {
                name: name.to_string(),
                email: None,
                is_admin,
            },
        )
        .await
        .unwrap();

        let issued = issue_access_token(
            repository,
            user.id,
            IssueAccessTokenRequest {
                name: "test".to_string(),
            },
        )
        .await
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            format!("Bearer {}", issued.token).parse().unwrap(),
        );
        (user.id, headers)
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(http::header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));

        headers.insert(http::header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(http::header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_manager_gate_requires_credentials_and_admin() {
        let (_db, repository) = setup_test_repository().await;
        let (admin_id, admin_headers) = seed_user_with_token(&repository, "root", true).await;
        let (_member_id, member_headers) = seed_user_with_token(&repository, "member", false).await;

        // Anonymous callers never reach the management surface
        let anonymous = authenticate_manager(&repository, &HeaderMap::new()).await;
        match anonymous.unwrap_err() {
            CommonError::Authentication { .. } => {}
            e => panic!("Expected Authentication error, got: {e:?}"),
        }

        // A valid token without the admin flag is still denied
        let denied = authenticate_manager(&repository, &member_headers).await;
        match denied.unwrap_err() {
            CommonError::Authorization { .. } => {}
            e => panic!("Expected Authorization error, got: {e:?}"),
        }

        let actor = authenticate_manager(&repository, &admin_headers)
            .await
            .unwrap();
        assert_eq!(actor, admin_id);
    }

    #[tokio::test]
    async fn test_self_or_manager_gate() {
        let (_db, repository) = setup_test_repository().await;
        let (admin_id, admin_headers) = seed_user_with_token(&repository, "root", true).await;
        let (member_id, member_headers) = seed_user_with_token(&repository, "member", false).await;
        let (other_id, _other_headers) = seed_user_with_token(&repository, "other", false).await;

        // Users may act on their own account
        let actor = authenticate_self_or_manager(&repository, &member_headers, &member_id)
            .await
            .unwrap();
        assert_eq!(actor, member_id);

        // But not on anyone else's
        let denied = authenticate_self_or_manager(&repository, &member_headers, &other_id).await;
        match denied.unwrap_err() {
            CommonError::Authorization { .. } => {}
            e => panic!("Expected Authorization error, got: {e:?}"),
        }

        // Admins may act on any account
        let actor = authenticate_self_or_manager(&repository, &admin_headers, &member_id)
            .await
            .unwrap();
        assert_eq!(actor, admin_id);
    }
}
