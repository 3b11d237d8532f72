use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::{
    error::CommonError,
    primitives::{WrappedChronoDateTime, WrappedUuidV4},
};
use utoipa::ToSchema;

use crate::{
    logic::{
        access_token::resolve_access_token, application::Application,
        permission::authorize_env_access, tier::EnvironmentTier,
    },
    repository::{
        AccessTokenRepositoryLike, ApplicationRepositoryLike, PermissionRepositoryLike,
        VariableRepositoryLike,
    },
};

/// A rendered dotenv file ready to be served as an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct EnvFile {
    pub file_name: String,
    pub contents: String,
}

/// Everything the renderer needs, resolved up front. Rendering itself is a
/// pure function of this context so it can be tested without a database.
#[derive(Debug, Clone)]
pub struct EnvFileContext {
    pub application_name: String,
    pub tier: EnvironmentTier,
    /// (name, value) pairs already in generation order. `None` renders as
    /// an empty assignment.
    pub entries: Vec<(String, Option<String>)>,
    pub generated_at: WrappedChronoDateTime,
}

/// Render the dotenv file for a context.
///
/// Values are emitted double-quoted and verbatim. No escaping is applied;
/// the stored value round-trips into the file byte for byte, which is what
/// consumers of these files have come to rely on.
pub fn generate_env_file(context: &EnvFileContext) -> EnvFile {
    let mut contents = String::new();

    contents.push_str(&format!(
        "# Environment file for {} ({})\n",
        context.application_name, context.tier
    ));
    contents.push_str(&format!(
        "# Generated at {}\n",
        context.generated_at.get_inner().format("%Y-%m-%d %H:%M:%S")
    ));
    contents.push('\n');

    for (name, value) in &context.entries {
        let value = value.as_deref().unwrap_or("");
        contents.push_str(&format!("{name}=\"{value}\"\n"));
    }

    EnvFile {
        file_name: format!(".env.{}", context.tier.file_suffix()),
        contents,
    }
}

async fn build_context<R>(
    repository: &R,
    application: &Application,
    tier: EnvironmentTier,
) -> Result<EnvFileContext, CommonError>
where
    R: VariableRepositoryLike,
{
    // Variables come back in generation order; each contributes one line
    // whether or not a value exists for this tier.
    let variables = repository
        .get_variables_for_application(&application.id)
        .await?;

    let mut entries = Vec::with_capacity(variables.len());
    for variable in variables {
        let value = repository.get_value(&variable.id, tier).await?;
        entries.push((variable.name, value.map(|v| v.value)));
    }

    Ok(EnvFileContext {
        application_name: application.name.clone(),
        tier,
        entries,
        generated_at: WrappedChronoDateTime::now(),
    })
}

async fn require_application<R: ApplicationRepositoryLike>(
    repository: &R,
    application_id: &WrappedUuidV4,
) -> Result<Application, CommonError> {
    let application = repository.get_application_by_id(application_id).await?;
    application.ok_or_else(|| CommonError::NotFound {
        msg: format!("Application with id {application_id} not found"),
        lookup_id: application_id.to_string(),
        source: None,
    })
}

/// Authenticated download path: the caller's session user must hold the
/// tier capability for this application.
///
/// The application lookup runs before the capability check, so an unknown
/// application is a 404 even for callers with no permissions at all.
pub async fn download_env_file<R>(
    repository: &R,
    user_id: &WrappedUuidV4,
    application_id: WrappedUuidV4,
    tier: EnvironmentTier,
) -> Result<EnvFile, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike + PermissionRepositoryLike,
{
    let application = require_application(repository, &application_id).await?;

    authorize_env_access(repository, user_id, tier, &application_id).await?;

    let context = build_context(repository, &application, tier).await?;
    Ok(generate_env_file(&context))
}

/// Share-link download path: the token in the URL stands in for a session.
///
/// The token resolves to its owning user and the same capability check
/// applies; a share link never grants more than its creator could see.
pub async fn download_env_file_with_token<R>(
    repository: &R,
    token_value: &str,
    application_id: WrappedUuidV4,
    tier: EnvironmentTier,
) -> Result<EnvFile, CommonError>
where
    R: ApplicationRepositoryLike
        + VariableRepositoryLike
        + PermissionRepositoryLike
        + AccessTokenRepositoryLike,
{
    let application = require_application(repository, &application_id).await?;

    let access_token = resolve_access_token(repository, token_value).await?;

    authorize_env_access(repository, &access_token.user_id, tier, &application_id).await?;

    let context = build_context(repository, &application, tier).await?;
    Ok(generate_env_file(&context))
}

#[cfg(test)]
mod unit_test {
    use super::*;
    use crate::logic::access_token::{IssueAccessTokenRequest, issue_access_token};
    use crate::logic::application::{CreateApplicationRequest, create_application};
    use crate::logic::permission::{GrantPermissionRequest, grant_permission};
    use crate::logic::user::{CreateUserRequest, create_user};
    use crate::logic::variable::{CreateVariableRequest, SetValueRequest, create_variable, set_value};
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

    fn fixed_time() -> WrappedChronoDateTime {
        use chrono::TimeZone;
        WrappedChronoDateTime::new(
            chrono::Utc
                .with_ymd_and_hms(2024, 3, 15, 10, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_render_billing_production() {
        let context = EnvFileContext {
            application_name: "Billing".to_string(),
            tier: EnvironmentTier::Production,
            entries: vec![
                ("APP_NAME".to_string(), Some("Billing".to_string())),
                ("APP_KEY".to_string(), Some("secret123".to_string())),
                ("DB_HOST".to_string(), Some("db.prod.internal".to_string())),
            ],
            generated_at: fixed_time(),
        };

        let file = generate_env_file(&context);

        assert_eq!(file.file_name, ".env.production");
        assert_eq!(
            file.contents,
            "# Environment file for Billing (Production)\n\
             # Generated at 2024-03-15 10:30:00\n\
             \n\
             APP_NAME=\"Billing\"\n\
             APP_KEY=\"secret123\"\n\
             DB_HOST=\"db.prod.internal\"\n"
        );
    }

    #[test]
    fn test_render_missing_value_is_empty_assignment() {
        let context = EnvFileContext {
            application_name: "Billing".to_string(),
            tier: EnvironmentTier::Staging,
            entries: vec![
                ("APP_KEY".to_string(), None),
                ("DB_HOST".to_string(), Some("db.staging.internal".to_string())),
            ],
            generated_at: fixed_time(),
        };

        let file = generate_env_file(&context);

        assert!(file.contents.contains("APP_KEY=\"\"\n"));
        assert!(file.contents.contains("DB_HOST=\"db.staging.internal\"\n"));
    }

    #[test]
    fn test_render_no_variables_is_header_only() {
        let context = EnvFileContext {
            application_name: "Empty App".to_string(),
            tier: EnvironmentTier::Development,
            entries: vec![],
            generated_at: fixed_time(),
        };

        let file = generate_env_file(&context);

        assert_eq!(file.file_name, ".env.development");
        assert_eq!(
            file.contents,
            "# Environment file for Empty App (Development)\n\
             # Generated at 2024-03-15 10:30:00\n\
             \n"
        );
    }

    #[test]
    fn test_render_values_are_not_escaped() {
        let context = EnvFileContext {
            application_name: "Billing".to_string(),
            tier: EnvironmentTier::Development,
            entries: vec![(
                "WEIRD".to_string(),
                Some("has \"quotes\" and $dollars".to_string()),
            )],
            generated_at: fixed_time(),
        };

        let file = generate_env_file(&context);

        assert!(
            file.contents
                .contains("WEIRD=\"has \"quotes\" and $dollars\"\n")
        );
    }

    #[test]
    fn test_render_is_deterministic_for_same_context() {
        let context = EnvFileContext {
            application_name: "Billing".to_string(),
            tier: EnvironmentTier::Production,
            entries: vec![("APP_KEY".to_string(), Some("secret".to_string()))],
            generated_at: fixed_time(),
        };

        assert_eq!(generate_env_file(&context), generate_env_file(&context));
    }

    async fn seed_billing(repository: &Repository) -> WrappedUuidV4 {
        let application = create_application(
            repository,
            None,
            CreateApplicationRequest {
                name: "Billing".to_string(),
                slug: None,
            },
        )
        .await
        .unwrap();

        for (name, sequence, value) in [
            ("DB_HOST", None, Some("db.prod.internal")),
            ("APP_NAME", Some(1), Some("Billing")),
            ("APP_KEY", Some(2), None),
        ] {
            let variable = create_variable(
                repository,
                None,
                application.id,
                CreateVariableRequest {
                    name: name.to_string(),
                    sequence,
                },
            )
            .await
            .unwrap();

            if let Some(value) = value {
                set_value(
                    repository,
                    None,
                    application.id,
                    variable.id,
                    EnvironmentTier::Production,
                    SetValueRequest {
                        value: value.to_string(),
                    },
                )
                .await
                .unwrap();
            }
        }

        application.id
    }

    async fn seed_user_with_global_production(repository: &Repository) -> WrappedUuidV4 {
        let user_id = create_user(
            repository,
            CreateUserRequest {
                name: "ops".to_string(),
                email: None,
                is_admin: false,
            },
        )
        .await
        .unwrap()
        .id;

        grant_permission(
            repository,
            user_id,
            GrantPermissionRequest {
                tier: EnvironmentTier::Production,
                application_id: None,
            },
        )
        .await
        .unwrap();

        user_id
    }

    #[tokio::test]
    async fn test_download_renders_variables_in_order() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_billing(&repository).await;
        let user_id = seed_user_with_global_production(&repository).await;

        let file = download_env_file(
            &repository,
            &user_id,
            application_id,
            EnvironmentTier::Production,
        )
        .await
        .unwrap();

        assert_eq!(file.file_name, ".env.production");

        let body: Vec<&str> = file.contents.lines().skip(3).collect();
        assert_eq!(
            body,
            vec![
                "APP_NAME=\"Billing\"",
                "APP_KEY=\"\"",
                "DB_HOST=\"db.prod.internal\"",
            ]
        );
    }

    #[tokio::test]
    async fn test_download_without_permission_denied() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_billing(&repository).await;

        let user_id = create_user(
            &repository,
            CreateUserRequest {
                name: "intern".to_string(),
                email: None,
                is_admin: false,
            },
        )
        .await
        .unwrap()
        .id;

        let result = download_env_file(
            &repository,
            &user_id,
            application_id,
            EnvironmentTier::Production,
        )
        .await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::Authorization { .. } => {}
            e => panic!("Expected Authorization error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_unknown_application_is_not_found() {
        let (_db, repository) = setup_test_repository().await;
        let user_id = seed_user_with_global_production(&repository).await;

        let result = download_env_file(
            &repository,
            &user_id,
            WrappedUuidV4::new(),
            EnvironmentTier::Production,
        )
        .await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::NotFound { .. } => {}
            e => panic!("Expected NotFound error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_download_matches_session_download() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_billing(&repository).await;
        let user_id = seed_user_with_global_production(&repository).await;

        let issued = issue_access_token(
            &repository,
            user_id,
            IssueAccessTokenRequest {
                name: "share".to_string(),
            },
        )
        .await
        .unwrap();

        let via_token = download_env_file_with_token(
            &repository,
            &issued.token,
            application_id,
            EnvironmentTier::Production,
        )
        .await
        .unwrap();

        let via_session = download_env_file(
            &repository,
            &user_id,
            application_id,
            EnvironmentTier::Production,
        )
        .await
        .unwrap();

        assert_eq!(via_token.file_name, via_session.file_name);
        // Bodies match; the timestamp header line may differ between calls
        assert_eq!(
            via_token.contents.lines().skip(2).collect::<Vec<_>>(),
            via_session.contents.lines().skip(2).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_token_download_with_bad_token_is_invalid_token() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_billing(&repository).await;

        let result = download_env_file_with_token(
            &repository,
            "deadbeef",
            application_id,
            EnvironmentTier::Production,
        )
        .await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::InvalidToken { .. } => {}
            e => panic!("Expected InvalidToken error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_download_cannot_exceed_owner_permissions() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_billing(&repository).await;

        let user_id = create_user(
            &repository,
            CreateUserRequest {
                name: "dev".to_string(),
                email: None,
                is_admin: false,
            },
        )
        .await
        .unwrap()
        .id;

        grant_permission(
            &repository,
            user_id,
            GrantPermissionRequest {
                tier: EnvironmentTier::Development,
                application_id: Some(application_id),
            },
        )
        .await
        .unwrap();

        let issued = issue_access_token(
            &repository,
            user_id,
            IssueAccessTokenRequest {
                name: "share".to_string(),
            },
        )
        .await
        .unwrap();

        let allowed = download_env_file_with_token(
            &repository,
            &issued.token,
            application_id,
            EnvironmentTier::Development,
        )
        .await;
        assert!(allowed.is_ok());

        let denied = download_env_file_with_token(
            &repository,
            &issued.token,
            application_id,
            EnvironmentTier::Production,
        )
        .await;
        assert!(denied.is_err());
        match denied.unwrap_err() {
            CommonError::Authorization { .. } => {}
            e => panic!("Expected Authorization error, got: {e:?}"),
        }
    }
}
