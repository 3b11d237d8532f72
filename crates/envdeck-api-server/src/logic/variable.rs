use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::{
    error::CommonError,
    primitives::{WrappedChronoDateTime, WrappedUuidV4},
};
use utoipa::ToSchema;

use crate::{
    logic::{
        history::{ChangeAction, ChangeEntity, record_change},
        tier::EnvironmentTier,
    },
    repository::{
        ApplicationRepositoryLike, ChangeHistoryRepositoryLike, CreateVariable, UpdateVariable,
        UpsertValue, VariableRepositoryLike,
    },
};

/// A named slot in an application's environment. The slot itself is
/// tier-agnostic; per-tier values hang off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct EnvironmentVariable {
    pub id: WrappedUuidV4,
    pub application_id: WrappedUuidV4,
    pub name: String,
    /// Explicit ordering position in generated files. Unordered variables
    /// sort after ordered ones, alphabetically.
    pub sequence: Option<i64>,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct EnvironmentValue {
    pub id: WrappedUuidV4,
    pub variable_id: WrappedUuidV4,
    pub tier: EnvironmentTier,
    pub value: String,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct CreateVariableRequest {
    pub name: String,
    pub sequence: Option<i64>,
}

pub type CreateVariableResponse = EnvironmentVariable;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct UpdateVariableRequest {
    pub name: String,
    pub sequence: Option<i64>,
}

pub type UpdateVariableResponse = EnvironmentVariable;

pub type GetVariableResponse = EnvironmentVariable;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListVariablesResponse {
    pub variables: Vec<EnvironmentVariable>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct DeleteVariableResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SetValueRequest {
    pub value: String,
}

pub type SetValueResponse = EnvironmentValue;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListValuesResponse {
    pub values: Vec<EnvironmentValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct DeleteValueResponse {
    pub success: bool,
}

/// Accepts the POSIX-ish shape every dotenv consumer agrees on:
/// leading letter or underscore, then letters, digits, underscores.
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn require_application<R: ApplicationRepositoryLike>(
    repository: &R,
    application_id: &WrappedUuidV4,
) -> Result<(), CommonError> {
    if repository
        .get_application_by_id(application_id)
        .await?
        .is_none()
    {
        return Err(CommonError::NotFound {
            msg: format!("Application with id {application_id} not found"),
            lookup_id: application_id.to_string(),
            source: None,
        });
    }
    Ok(())
}

async fn require_variable<R: VariableRepositoryLike>(
    repository: &R,
    application_id: &WrappedUuidV4,
    variable_id: &WrappedUuidV4,
) -> Result<EnvironmentVariable, CommonError> {
    let variable = repository.get_variable_by_id(variable_id).await?;
    match variable {
        Some(variable) if variable.application_id == *application_id => Ok(variable),
        _ => Err(CommonError::NotFound {
            msg: format!("Variable with id {variable_id} not found"),
            lookup_id: variable_id.to_string(),
            source: None,
        }),
    }
}

pub async fn create_variable<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    application_id: WrappedUuidV4,
    request: CreateVariableRequest,
) -> Result<CreateVariableResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike + ChangeHistoryRepositoryLike,
{
    require_application(repository, &application_id).await?;

    if !is_valid_variable_name(&request.name) {
        return Err(CommonError::InvalidRequest {
            msg: format!("'{}' is not a valid environment variable name", request.name),
            source: None,
        });
    }

    if repository
        .get_variable_by_name(&application_id, &request.name)
        .await?
        .is_some()
    {
        return Err(CommonError::InvalidRequest {
            msg: format!(
                "Variable '{}' already exists for this application",
                request.name
            ),
            source: None,
        });
    }

    let now = WrappedChronoDateTime::now();
    let id = WrappedUuidV4::new();

    let variable = EnvironmentVariable {
        id,
        application_id,
        name: request.name.clone(),
        sequence: request.sequence,
        created_at: now,
        updated_at: now,
    };

    let create_params = CreateVariable {
        id,
        application_id,
        name: request.name,
        sequence: request.sequence,
        created_at: now,
        updated_at: now,
    };

    repository.create_variable(&create_params).await?;

    record_change(
        repository,
        &application_id,
        actor,
        ChangeEntity::Variable,
        &variable.id.to_string(),
        ChangeAction::Created,
        format!("created variable '{}'", variable.name),
    )
    .await?;

    Ok(variable)
}

pub async fn update_variable<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    application_id: WrappedUuidV4,
    variable_id: WrappedUuidV4,
    request: UpdateVariableRequest,
) -> Result<UpdateVariableResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike + ChangeHistoryRepositoryLike,
{
    let existing = require_variable(repository, &application_id, &variable_id).await?;

    if !is_valid_variable_name(&request.name) {
        return Err(CommonError::InvalidRequest {
            msg: format!("'{}' is not a valid environment variable name", request.name),
            source: None,
        });
    }

    if request.name != existing.name
        && repository
            .get_variable_by_name(&application_id, &request.name)
            .await?
            .is_some()
    {
        return Err(CommonError::InvalidRequest {
            msg: format!(
                "Variable '{}' already exists for this application",
                request.name
            ),
            source: None,
        });
    }

    let now = WrappedChronoDateTime::now();

    let update_params = UpdateVariable {
        id: variable_id,
        name: request.name.clone(),
        sequence: request.sequence,
        updated_at: now,
    };

    repository.update_variable(&update_params).await?;

    let detail = if request.name != existing.name {
        format!("renamed variable '{}' to '{}'", existing.name, request.name)
    } else {
        format!("updated variable '{}'", existing.name)
    };

    record_change(
        repository,
        &application_id,
        actor,
        ChangeEntity::Variable,
        &variable_id.to_string(),
        ChangeAction::Updated,
        detail,
    )
    .await?;

    Ok(EnvironmentVariable {
        id: variable_id,
        application_id,
        name: request.name,
        sequence: request.sequence,
        created_at: existing.created_at,
        updated_at: now,
    })
}

pub async fn delete_variable<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    application_id: WrappedUuidV4,
    variable_id: WrappedUuidV4,
) -> Result<DeleteVariableResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike + ChangeHistoryRepositoryLike,
{
    let existing = require_variable(repository, &application_id, &variable_id).await?;

    repository.delete_variable(&variable_id).await?;

    record_change(
        repository,
        &application_id,
        actor,
        ChangeEntity::Variable,
        &variable_id.to_string(),
        ChangeAction::Deleted,
        format!("deleted variable '{}'", existing.name),
    )
    .await?;

    Ok(DeleteVariableResponse { success: true })
}

pub async fn get_variable_by_id<R>(
    repository: &R,
    application_id: WrappedUuidV4,
    variable_id: WrappedUuidV4,
) -> Result<GetVariableResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike,
{
    require_variable(repository, &application_id, &variable_id).await
}

/// Variables in generation order: sequence ascending with unsequenced
/// variables last, name as the tie-breaker.
pub async fn list_variables<R>(
    repository: &R,
    application_id: WrappedUuidV4,
) -> Result<ListVariablesResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike,
{
    require_application(repository, &application_id).await?;

    let variables = repository
        .get_variables_for_application(&application_id)
        .await?;

    Ok(ListVariablesResponse { variables })
}

pub async fn set_value<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    application_id: WrappedUuidV4,
    variable_id: WrappedUuidV4,
    tier: EnvironmentTier,
    request: SetValueRequest,
) -> Result<SetValueResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike + ChangeHistoryRepositoryLike,
{
    let variable = require_variable(repository, &application_id, &variable_id).await?;

    let existing = repository.get_value(&variable_id, tier).await?;

    let now = WrappedChronoDateTime::now();

    let upsert_params = UpsertValue {
        id: existing
            .as_ref()
            .map(|v| v.id)
            .unwrap_or_else(WrappedUuidV4::new),
        variable_id,
        tier,
        value: request.value.clone(),
        created_at: existing.as_ref().map(|v| v.created_at).unwrap_or(now),
        updated_at: now,
    };

    repository.upsert_value(&upsert_params).await?;

    let action = if existing.is_some() {
        ChangeAction::Updated
    } else {
        ChangeAction::Created
    };

    // Values never land in the history detail text; only the fact that one
    // changed does.
    record_change(
        repository,
        &application_id,
        actor,
        ChangeEntity::Value,
        &upsert_params.id.to_string(),
        action,
        format!("{} {} value of '{}'", action.as_str(), tier, variable.name),
    )
    .await?;

    Ok(EnvironmentValue {
        id: upsert_params.id,
        variable_id,
        tier,
        value: request.value,
        created_at: upsert_params.created_at,
        updated_at: now,
    })
}

pub async fn delete_value<R>(
    repository: &R,
    actor: Option<&WrappedUuidV4>,
    application_id: WrappedUuidV4,
    variable_id: WrappedUuidV4,
    tier: EnvironmentTier,
) -> Result<DeleteValueResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike + ChangeHistoryRepositoryLike,
{
    let variable = require_variable(repository, &application_id, &variable_id).await?;

    let existing = repository.get_value(&variable_id, tier).await?;
    let existing = existing.ok_or_else(|| CommonError::NotFound {
        msg: format!("No {tier} value set for variable '{}'", variable.name),
        lookup_id: variable_id.to_string(),
        source: None,
    })?;

    repository.delete_value(&existing.id).await?;

    record_change(
        repository,
        &application_id,
        actor,
        ChangeEntity::Value,
        &existing.id.to_string(),
        ChangeAction::Deleted,
        format!("deleted {} value of '{}'", tier, variable.name),
    )
    .await?;

    Ok(DeleteValueResponse { success: true })
}

pub async fn list_values<R>(
    repository: &R,
    application_id: WrappedUuidV4,
    variable_id: WrappedUuidV4,
) -> Result<ListValuesResponse, CommonError>
where
    R: ApplicationRepositoryLike + VariableRepositoryLike,
{
    require_variable(repository, &application_id, &variable_id).await?;

    let values = repository.get_values_for_variable(&variable_id).await?;

    Ok(ListValuesResponse { values })
}

#[cfg(test)]
mod unit_test {
    use super::*;
    use crate::logic::application::{CreateApplicationRequest, create_application};
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

    #[test]
    fn test_variable_name_validation() {
        assert!(is_valid_variable_name("APP_KEY"));
        assert!(is_valid_variable_name("_INTERNAL"));
        assert!(is_valid_variable_name("DB2_HOST"));
        assert!(!is_valid_variable_name(""));
        assert!(!is_valid_variable_name("2FAST"));
        assert!(!is_valid_variable_name("APP-KEY"));
        assert!(!is_valid_variable_name("APP KEY"));
    }

    #[tokio::test]
    async fn test_create_variable() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        let created = create_variable(
            &repository,
            None,
            application_id,
            CreateVariableRequest {
                name: "APP_KEY".to_string(),
                sequence: Some(1),
            },
        )
        .await
        .unwrap();

        assert_eq!(created.name, "APP_KEY");
        assert_eq!(created.sequence, Some(1));
    }

    #[tokio::test]
    async fn test_create_variable_rejects_invalid_name() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        let result = create_variable(
            &repository,
            None,
            application_id,
            CreateVariableRequest {
                name: "NOT VALID".to_string(),
                sequence: None,
            },
        )
        .await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CommonError::InvalidRequest { .. } => {}
            e => panic!("Expected InvalidRequest error, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_variable_rejects_duplicate_name() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        let request = CreateVariableRequest {
            name: "APP_KEY".to_string(),
            sequence: None,
        };
        create_variable(&repository, None, application_id, request.clone())
            .await
            .unwrap();

        let result = create_variable(&repository, None, application_id, request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_same_name_allowed_across_applications() {
        let (_db, repository) = setup_test_repository().await;
        let billing = seed_application(&repository, "Billing").await;
        let shipping = seed_application(&repository, "Shipping").await;

        let request = CreateVariableRequest {
            name: "APP_KEY".to_string(),
            sequence: None,
        };
        create_variable(&repository, None, billing, request.clone())
            .await
            .unwrap();
        let result = create_variable(&repository, None, shipping, request).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_variable_scoped_to_application() {
        let (_db, repository) = setup_test_repository().await;
        let billing = seed_application(&repository, "Billing").await;
        let shipping = seed_application(&repository, "Shipping").await;

        let created = create_variable(
            &repository,
            None,
            billing,
            CreateVariableRequest {
                name: "APP_KEY".to_string(),
                sequence: None,
            },
        )
        .await
        .unwrap();

        // Looking it up through a different application is a miss
        let result = get_variable_by_id(&repository, shipping, created.id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_set_value_then_update() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        let variable = create_variable(
            &repository,
            None,
            application_id,
            CreateVariableRequest {
                name: "DB_HOST".to_string(),
                sequence: None,
            },
        )
        .await
        .unwrap();

        let first = set_value(
            &repository,
            None,
            application_id,
            variable.id,
            EnvironmentTier::Staging,
            SetValueRequest {
                value: "db.staging.internal".to_string(),
            },
        )
        .await
        .unwrap();

        let second = set_value(
            &repository,
            None,
            application_id,
            variable.id,
            EnvironmentTier::Staging,
            SetValueRequest {
                value: "db2.staging.internal".to_string(),
            },
        )
        .await
        .unwrap();

        // Upsert keeps the same row
        assert_eq!(first.id, second.id);
        assert_eq!(second.value, "db2.staging.internal");

        let values = list_values(&repository, application_id, variable.id)
            .await
            .unwrap();
        assert_eq!(values.values.len(), 1);
    }

    #[tokio::test]
    async fn test_values_are_tier_independent() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        let variable = create_variable(
            &repository,
            None,
            application_id,
            CreateVariableRequest {
                name: "DB_HOST".to_string(),
                sequence: None,
            },
        )
        .await
        .unwrap();

        for (tier, value) in [
            (EnvironmentTier::Development, "localhost"),
            (EnvironmentTier::Staging, "db.staging.internal"),
            (EnvironmentTier::Production, "db.prod.internal"),
        ] {
            set_value(
                &repository,
                None,
                application_id,
                variable.id,
                tier,
                SetValueRequest {
                    value: value.to_string(),
                },
            )
            .await
            .unwrap();
        }

        let values = list_values(&repository, application_id, variable.id)
            .await
            .unwrap();
        assert_eq!(values.values.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_value() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        let variable = create_variable(
            &repository,
            None,
            application_id,
            CreateVariableRequest {
                name: "DB_HOST".to_string(),
                sequence: None,
            },
        )
        .await
        .unwrap();

        set_value(
            &repository,
            None,
            application_id,
            variable.id,
            EnvironmentTier::Production,
            SetValueRequest {
                value: "db.prod.internal".to_string(),
            },
        )
        .await
        .unwrap();

        delete_value(
            &repository,
            None,
            application_id,
            variable.id,
            EnvironmentTier::Production,
        )
        .await
        .unwrap();

        let values = list_values(&repository, application_id, variable.id)
            .await
            .unwrap();
        assert!(values.values.is_empty());

        // A second delete reports the miss
        let result = delete_value(
            &repository,
            None,
            application_id,
            variable.id,
            EnvironmentTier::Production,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_variables_ordering() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        for (name, sequence) in [
            ("ZED", None),
            ("APP_KEY", Some(2)),
            ("ALPHA", None),
            ("APP_NAME", Some(1)),
        ] {
            create_variable(
                &repository,
                None,
                application_id,
                CreateVariableRequest {
                    name: name.to_string(),
                    sequence,
                },
            )
            .await
            .unwrap();
        }

        let listed = list_variables(&repository, application_id).await.unwrap();
        let names: Vec<&str> = listed.variables.iter().map(|v| v.name.as_str()).collect();

        assert_eq!(names, vec!["APP_NAME", "APP_KEY", "ALPHA", "ZED"]);
    }

    #[tokio::test]
    async fn test_delete_variable_removes_values() {
        let (_db, repository) = setup_test_repository().await;
        let application_id = seed_application(&repository, "Billing").await;

        let variable = create_variable(
            &repository,
            None,
            application_id,
            CreateVariableRequest {
                name: "DB_HOST".to_string(),
                sequence: None,
            },
        )
        .await
        .unwrap();

        set_value(
            &repository,
            None,
            application_id,
            variable.id,
            EnvironmentTier::Development,
            SetValueRequest {
                value: "localhost".to_string(),
            },
        )
        .await
        .unwrap();

        delete_variable(&repository, None, application_id, variable.id)
            .await
            .unwrap();

        let result = get_variable_by_id(&repository, application_id, variable.id).await;
        assert!(result.is_err());
    }
}
