use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::{
    error::CommonError,
    primitives::{PaginatedResponse, PaginationRequest, WrappedChronoDateTime, WrappedUuidV4},
};
use utoipa::ToSchema;

use crate::{
    logic::history::{ChangeAction, ChangeEntity, record_change},
    repository::{
        ApplicationRepositoryLike, ChangeHistoryRepositoryLike, CreateApplication,
        UpdateApplication,
    },
};

// Domain model for Application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Application {
    pub id: WrappedUuidV4,
    pub name: String,
    pub slug: String,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

// Request/Response types
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct CreateApplicationRequest {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
}

pub type CreateApplicationResponse = Application;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct UpdateApplicationRequest {
    pub name: String,
}

pub type UpdateApplicationResponse = Application;

pub type GetApplicationResponse = Application;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListApplicationsResponse {
    pub applications: Vec<Application>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct DeleteApplicationResponse {
    pub success: bool,
}

/// Turn a display name into a URL-safe slug ("My Billing App" -> "my-billing-app").
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}

pub async fn create_application<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    request: CreateApplicationRequest,
) -> Result<CreateApplicationResponse, CommonError>
where
    R: ApplicationRepositoryLike + ChangeHistoryRepositoryLike,
{
    if request.name.trim().is_empty() {
        return Err(CommonError::InvalidRequest {
            msg: "Application name must not be empty".to_string(),
            source: None,
        });
    }

    let slug = match request.slug {
        Some(slug) => slug,
        None => slugify(&request.name),
    };

    if slug.is_empty() {
        return Err(CommonError::InvalidRequest {
            msg: "Application slug must not be empty".to_string(),
            source: None,
        });
    }

    if repository.get_application_by_slug(&slug).await?.is_some() {
        return Err(CommonError::InvalidRequest {
            msg: format!("Application slug '{slug}' is already in use"),
            source: None,
        });
    }

    let now = WrappedChronoDateTime::now();
    let id = WrappedUuidV4::new();

    let application = Application {
        id,
        name: request.name.clone(),
        slug: slug.clone(),
        created_at: now,
        updated_at: now,
    };

    let create_params = CreateApplication {
        id,
        name: request.name,
        slug,
        created_at: now,
        updated_at: now,
    };

    repository.create_application(&create_params).await?;

    record_change(
        repository,
        &application.id,
        actor,
        ChangeEntity::Application,
        &application.id.to_string(),
        ChangeAction::Created,
        format!("created application '{}'", application.name),
    )
    .await?;

    Ok(application)
}

pub async fn update_application<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    id: WrappedUuidV4,
    request: UpdateApplicationRequest,
) -> Result<UpdateApplicationResponse, CommonError>
where
    R: ApplicationRepositoryLike + ChangeHistoryRepositoryLike,
{
    let existing = repository.get_application_by_id(&id).await?;
    let existing = existing.ok_or_else(|| CommonError::NotFound {
        msg: format!("Application with id {id} not found"),
        lookup_id: id.to_string(),
        source: None,
    })?;

    if request.name.trim().is_empty() {
        return Err(CommonError::InvalidRequest {
            msg: "Application name must not be empty".to_string(),
            source: None,
        });
    }

    let now = WrappedChronoDateTime::now();

    let update_params = UpdateApplication {
        id,
        name: request.name.clone(),
        updated_at: now,
    };

    repository.update_application(&update_params).await?;

    record_change(
        repository,
        &id,
        actor,
        ChangeEntity::Application,
        &id.to_string(),
        ChangeAction::Updated,
        format!(
            "renamed application '{}' to '{}'",
            existing.name, request.name
        ),
    )
    .await?;

    Ok(Application {
        id,
        name: request.name,
        slug: existing.slug,
        created_at: existing.created_at,
        updated_at: now,
    })
}

pub async fn delete_application<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    id: WrappedUuidV4,
) -> Result<DeleteApplicationResponse, CommonError>
where
    R: ApplicationRepositoryLike + ChangeHistoryRepositoryLike,
{
    let existing = repository.get_application_by_id(&id).await?;
    let existing = existing.ok_or_else(|| CommonError::NotFound {
        msg: format!("Application with id {id} not found"),
        lookup_id: id.to_string(),
        source: None,
    })?;

    // History entries cascade with the application row, so this entry only
    // survives until the delete below; recorded anyway for symmetry with the
    // other mutations and for repositories that retain history elsewhere.
    record_change(
        repository,
        &id,
        actor,
        ChangeEntity::Application,
        &id.to_string(),
        ChangeAction::Deleted,
        format!("deleted application '{}'", existing.name),
    )
    .await?;

    repository.delete_application(&id).await?;

    Ok(DeleteApplicationResponse { success: true })
}

pub async fn get_application_by_id<R: ApplicationRepositoryLike>(
    repository: &R,
    id: WrappedUuidV4,
) -> Result<GetApplicationResponse, CommonError> {
    let application = repository.get_application_by_id(&id).await?;
    let application = application.ok_or_else(|| CommonError::NotFound {
        msg: format!("Application with id {id} not found"),
        lookup_id: id.to_string(),
        source: None,
    })?;

    Ok(application)
}

pub async fn list_applications<R: ApplicationRepositoryLike>(
    repository: &R,
    pagination: PaginationRequest,
) -> Result<ListApplicationsResponse, CommonError> {
    let paginated: PaginatedResponse<Application> =
        repository.get_applications(&pagination).await?;

    Ok(ListApplicationsResponse {
        applications: paginated.items,
        next_page_token: paginated.next_page_token,
    })
}

#[cfg(test)]
mod unit_test {
    use super::*;
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

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Billing"), "billing");
        assert_eq!(slugify("My Billing App"), "my-billing-app");
        assert_eq!(slugify("  Spaces  everywhere "), "spaces-everywhere");
        assert_eq!(slugify("Already-Slugged"), "already-slugged");
    }

    #[tokio::test]
    async fn test_create_application() {
        let (_db, repository) = setup_test_repository().await;

        let request = CreateApplicationRequest {
            name: "Billing".to_string(),
            slug: None,
        };

        let result = create_application(&repository, None, request).await;

        assert!(result.is_ok());
        let application = result.unwrap();
        assert_eq!(application.name, "Billing");
        assert_eq!(application.slug, "billing");
    }

    #[tokio::test]
    async fn test_create_application_duplicate_slug() {
        let (_db, repository) = setup_test_repository().await;

        let request = CreateApplicationRequest {
            name: "Billing".to_string(),
            slug: None,
        };
        create_application(&repository, None, request.clone())
            .await
            .unwrap();

        let result = create_application(&repository, None, request).await;
        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::InvalidRequest { .. } => {}
            e => panic!("Expected InvalidRequest error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_application() {
        let (_db, repository) = setup_test_repository().await;

        let created = create_application(
            &repository,
            None,
            CreateApplicationRequest {
                name: "Billing".to_string(),
                slug: None,
            },
        )
        .await
        .unwrap();

        let result = update_application(
            &repository,
            None,
            created.id,
            UpdateApplicationRequest {
                name: "Invoicing".to_string(),
            },
        )
        .await;

        assert!(result.is_ok());
        let updated = result.unwrap();
        assert_eq!(updated.name, "Invoicing");
        // Renaming does not re-derive the slug
        assert_eq!(updated.slug, "billing");
    }

    #[tokio::test]
    async fn test_delete_application() {
        let (_db, repository) = setup_test_repository().await;

        let created = create_application(
            &repository,
            None,
            CreateApplicationRequest {
                name: "Billing".to_string(),
                slug: None,
            },
        )
        .await
        .unwrap();

        let result = delete_application(&repository, None, created.id).await;
        assert!(result.is_ok());
        assert!(result.unwrap().success);

        let get_result = get_application_by_id(&repository, created.id).await;
        assert!(get_result.is_err());
    }

    #[tokio::test]
    async fn test_get_application_not_found() {
        let (_db, repository) = setup_test_repository().await;

        let result = get_application_by_id(&repository, WrappedUuidV4::new()).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::NotFound { .. } => {}
            e => panic!("Expected NotFound error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_applications_pagination() {
        let (_db, repository) = setup_test_repository().await;

        for i in 0..5 {
            create_application(
                &repository,
                None,
                CreateApplicationRequest {
                    name: format!("App {i}"),
                    slug: None,
                },
            )
            .await
            .unwrap();
        }

        let result = list_applications(
            &repository,
            PaginationRequest {
                page_size: 3,
                next_page_token: None,
            },
        )
        .await;

        assert!(result.is_ok());
        let response = result.unwrap();
        assert_eq!(response.applications.len(), 3);
        assert!(response.next_page_token.is_some());

        let result = list_applications(
            &repository,
            PaginationRequest {
                page_size: 3,
                next_page_token: response.next_page_token,
            },
        )
        .await;

        assert!(result.is_ok());
        let response = result.unwrap();
        assert_eq!(response.applications.len(), 2);
    }

    #[tokio::test]
    async fn test_change_history_records_application_lifecycle() {
        let (_db, repository) = setup_test_repository().await;

        let created = create_application(
            &repository,
            None,
            CreateApplicationRequest {
                name: "Billing".to_string(),
                slug: None,
            },
        )
        .await
        .unwrap();

        update_application(
            &repository,
            None,
            created.id,
            UpdateApplicationRequest {
                name: "Invoicing".to_string(),
            },
        )
        .await
        .unwrap();

        let entries = crate::logic::history::list_change_entries(
            &repository,
            created.id,
            PaginationRequest {
                page_size: 10,
                next_page_token: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(entries.entries.len(), 2);
        // Newest first
        assert_eq!(entries.entries[0].action, ChangeAction::Updated);
        assert_eq!(entries.entries[1].action, ChangeAction::Created);
    }
}
