use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::{
    error::CommonError,
    primitives::{
        FromSqlValue, PaginatedResponse, PaginationRequest, WrappedChronoDateTime, WrappedUuidV4,
    },
};
use utoipa::ToSchema;

use crate::repository::{
    ApplicationRepositoryLike, ChangeHistoryRepositoryLike, RecordChange,
};

/// Kind of entity a change entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEntity {
    Application,
    Variable,
    Value,
}

impl ChangeEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeEntity::Application => "application",
            ChangeEntity::Variable => "variable",
            ChangeEntity::Value => "value",
        }
    }

    pub fn parse(s: &str) -> Option<ChangeEntity> {
        match s {
            "application" => Some(ChangeEntity::Application),
            "variable" => Some(ChangeEntity::Variable),
            "value" => Some(ChangeEntity::Value),
            _ => None,
        }
    }
}

impl FromSqlValue for ChangeEntity {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error> {
        match value {
            libsql::Value::Text(s) => ChangeEntity::parse(&s)
                .ok_or_else(|| anyhow::anyhow!("unknown change entity column value: {s}")),
            other => Err(anyhow::anyhow!("expected entity text column, got {other:?}")),
        }
    }
}

impl From<ChangeEntity> for libsql::Value {
    fn from(val: ChangeEntity) -> Self {
        libsql::Value::Text(val.as_str().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Created => "created",
            ChangeAction::Updated => "updated",
            ChangeAction::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<ChangeAction> {
        match s {
            "created" => Some(ChangeAction::Created),
            "updated" => Some(ChangeAction::Updated),
            "deleted" => Some(ChangeAction::Deleted),
            _ => None,
        }
    }
}

impl FromSqlValue for ChangeAction {
    fn from_sql(value: libsql::Value) -> Result<Self, anyhow::Error> {
        match value {
            libsql::Value::Text(s) => ChangeAction::parse(&s)
                .ok_or_else(|| anyhow::anyhow!("unknown change action column value: {s}")),
            other => Err(anyhow::anyhow!("expected action text column, got {other:?}")),
        }
    }
}

impl From<ChangeAction> for libsql::Value {
    fn from(val: ChangeAction) -> Self {
        libsql::Value::Text(val.as_str().to_string())
    }
}

/// Append-only change-history row for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ChangeEntry {
    pub id: WrappedUuidV4,
    pub application_id: WrappedUuidV4,
    pub user_id: Option<WrappedUuidV4>,
    pub entity: ChangeEntity,
    pub entity_id: String,
    pub action: ChangeAction,
    pub detail: String,
    pub created_at: WrappedChronoDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListChangeEntriesResponse {
    pub entries: Vec<ChangeEntry>,
    pub next_page_token: Option<String>,
}

/// Record a change entry against an application's history.
pub async fn record_change<R: ChangeHistoryRepositoryLike>(
    repository: &R,
    application_id: &WrappedUuidV4,
    actor: Option<&WrappedUuidV4>,
    entity: ChangeEntity,
    entity_id: &str,
    action: ChangeAction,
    detail: impl Into<String>,
) -> Result<(), CommonError> {
    let params = RecordChange {
        id: WrappedUuidV4::new(),
        application_id: *application_id,
        user_id: actor.copied(),
        entity,
        entity_id: entity_id.to_string(),
        action,
        detail: detail.into(),
        created_at: WrappedChronoDateTime::now(),
    };

    repository.record_change(&params).await
}

pub async fn list_change_entries<R>(
    repository: &R,
    application_id: WrappedUuidV4,
    pagination: PaginationRequest,
) -> Result<ListChangeEntriesResponse, CommonError>
where
    R: ChangeHistoryRepositoryLike + ApplicationRepositoryLike,
{
    let application = repository.get_application_by_id(&application_id).await?;
    if application.is_none() {
        return Err(CommonError::NotFound {
            msg: format!("Application with id {application_id} not found"),
            lookup_id: application_id.to_string(),
            source: None,
        });
    }

    let paginated: PaginatedResponse<ChangeEntry> = repository
        .get_changes_for_application(&application_id, &pagination)
        .await?;

    Ok(ListChangeEntriesResponse {
        entries: paginated.items,
        next_page_token: paginated.next_page_token,
    })
}
