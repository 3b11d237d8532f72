//! Environment variable and value HTTP endpoints

use axum::extract::{Json, Path, State};
use axum::http::HeaderMap;
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::authenticate_optional,
    logic::tier::EnvironmentTier,
    logic::variable::{
        CreateVariableRequest, CreateVariableResponse, DeleteValueResponse,
        DeleteVariableResponse, GetVariableResponse, ListValuesResponse, ListVariablesResponse,
        SetValueRequest, SetValueResponse, UpdateVariableRequest, UpdateVariableResponse,
        create_variable, delete_value, delete_variable, get_variable_by_id, list_values,
        list_variables, set_value, update_variable,
    },
    repository::Repository,
};
use shared::{adapters::openapi::JsonResponse, error::CommonError, primitives::WrappedUuidV4};

pub const PATH_PREFIX: &str = "/api";
pub const API_VERSION_1: &str = "v1";
pub const SERVICE_ROUTE_KEY: &str = "application";

#[derive(Clone)]
pub struct VariableService {
    pub repository: Repository,
}

impl VariableService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Create the variable router
pub fn create_router() -> OpenApiRouter<Arc<VariableService>> {
    OpenApiRouter::new()
        .routes(routes!(route_create_variable))
        .routes(routes!(route_list_variables))
        .routes(routes!(route_get_variable))
        .routes(routes!(route_update_variable))
        .routes(routes!(route_delete_variable))
        .routes(routes!(route_list_values))
        .routes(routes!(route_set_value))
        .routes(routes!(route_delete_value))
}

/// Tier names arrive as free-form path segments
fn parse_tier(tier: &str) -> Result<EnvironmentTier, CommonError> {
    EnvironmentTier::parse(tier).ok_or_else(|| CommonError::InvalidRequest {
        msg: format!("'{tier}' is not a known environment tier"),
        source: None,
    })
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}/{{application_id}}/variable", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
    ),
    request_body = CreateVariableRequest,
    responses(
        (status = 200, description = "Create a variable", body = CreateVariableResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Create variable",
    description = "Create a named variable slot on an application",
    operation_id = "create-variable",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_create_variable(
    State(ctx): State<Arc<VariableService>>,
    Path(application_id): Path<WrappedUuidV4>,
    headers: HeaderMap,
    Json(request): Json<CreateVariableRequest>,
) -> JsonResponse<CreateVariableResponse, CommonError> {
    trace!(%application_id, name = %request.name, "Creating variable");
    let res = match authenticate_optional(&ctx.repository, &headers).await {
        Ok(actor) => create_variable(&ctx.repository, actor.as_ref(), application_id, request).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Creating variable completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{application_id}}/variable", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
    ),
    responses(
        (status = 200, description = "List variables", body = ListVariablesResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List variables",
    description = "List an application's variables in generation order",
    operation_id = "list-variables",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_list_variables(
    State(ctx): State<Arc<VariableService>>,
    Path(application_id): Path<WrappedUuidV4>,
) -> JsonResponse<ListVariablesResponse, CommonError> {
    trace!(%application_id, "Listing variables");
    let res = list_variables(&ctx.repository, application_id).await;
    trace!(success = res.is_ok(), "Listing variables completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{application_id}}/variable/{{variable_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("variable_id" = WrappedUuidV4, Path, description = "Variable ID"),
    ),
    responses(
        (status = 200, description = "Get variable by id", body = GetVariableResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Get variable",
    description = "Get a variable by its ID",
    operation_id = "get-variable",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_get_variable(
    State(ctx): State<Arc<VariableService>>,
    Path((application_id, variable_id)): Path<(WrappedUuidV4, WrappedUuidV4)>,
) -> JsonResponse<GetVariableResponse, CommonError> {
    trace!(%application_id, %variable_id, "Getting variable");
    let res = get_variable_by_id(&ctx.repository, application_id, variable_id).await;
    trace!(success = res.is_ok(), "Getting variable completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    put,
    path = format!("{}/{}/{}/{{application_id}}/variable/{{variable_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("variable_id" = WrappedUuidV4, Path, description = "Variable ID"),
    ),
    request_body = UpdateVariableRequest,
    responses(
        (status = 200, description = "Update a variable", body = UpdateVariableResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Update variable",
    description = "Rename a variable or change its ordering position",
    operation_id = "update-variable",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_update_variable(
    State(ctx): State<Arc<VariableService>>,
    Path((application_id, variable_id)): Path<(WrappedUuidV4, WrappedUuidV4)>,
    headers: HeaderMap,
    Json(request): Json<UpdateVariableRequest>,
) -> JsonResponse<UpdateVariableResponse, CommonError> {
    trace!(%application_id, %variable_id, "Updating variable");
    let res = match authenticate_optional(&ctx.repository, &headers).await {
        Ok(actor) => {
            update_variable(
                &ctx.repository,
                actor.as_ref(),
                application_id,
                variable_id,
                request,
            )
            .await
        }
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Updating variable completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    delete,
    path = format!("{}/{}/{}/{{application_id}}/variable/{{variable_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("variable_id" = WrappedUuidV4, Path, description = "Variable ID"),
    ),
    responses(
        (status = 200, description = "Delete a variable", body = DeleteVariableResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Delete variable",
    description = "Delete a variable and all of its tier values",
    operation_id = "delete-variable",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_delete_variable(
    State(ctx): State<Arc<VariableService>>,
    Path((application_id, variable_id)): Path<(WrappedUuidV4, WrappedUuidV4)>,
    headers: HeaderMap,
) -> JsonResponse<DeleteVariableResponse, CommonError> {
    trace!(%application_id, %variable_id, "Deleting variable");
    let res = match authenticate_optional(&ctx.repository, &headers).await {
        Ok(actor) => {
            delete_variable(&ctx.repository, actor.as_ref(), application_id, variable_id).await
        }
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Deleting variable completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{application_id}}/variable/{{variable_id}}/value", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("variable_id" = WrappedUuidV4, Path, description = "Variable ID"),
    ),
    responses(
        (status = 200, description = "List values", body = ListValuesResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List values",
    description = "List the tier values of a variable",
    operation_id = "list-values",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_list_values(
    State(ctx): State<Arc<VariableService>>,
    Path((application_id, variable_id)): Path<(WrappedUuidV4, WrappedUuidV4)>,
) -> JsonResponse<ListValuesResponse, CommonError> {
    trace!(%application_id, %variable_id, "Listing values");
    let res = list_values(&ctx.repository, application_id, variable_id).await;
    trace!(success = res.is_ok(), "Listing values completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    put,
    path = format!("{}/{}/{}/{{application_id}}/variable/{{variable_id}}/value/{{tier}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("variable_id" = WrappedUuidV4, Path, description = "Variable ID"),
        ("tier" = String, Path, description = "Environment tier"),
    ),
    request_body = SetValueRequest,
    responses(
        (status = 200, description = "Set a value", body = SetValueResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Set value",
    description = "Insert or replace the value of a variable for one tier",
    operation_id = "set-value",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_set_value(
    State(ctx): State<Arc<VariableService>>,
    Path((application_id, variable_id, tier)): Path<(WrappedUuidV4, WrappedUuidV4, String)>,
    headers: HeaderMap,
    Json(request): Json<SetValueRequest>,
) -> JsonResponse<SetValueResponse, CommonError> {
    trace!(%application_id, %variable_id, %tier, "Setting value");
    let res = async {
        let tier = parse_tier(&tier)?;
        let actor = authenticate_optional(&ctx.repository, &headers).await?;
        set_value(
            &ctx.repository,
            actor.as_ref(),
            application_id,
            variable_id,
            tier,
            request,
        )
        .await
    }
    .await;
    trace!(success = res.is_ok(), "Setting value completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    delete,
    path = format!("{}/{}/{}/{{application_id}}/variable/{{variable_id}}/value/{{tier}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("variable_id" = WrappedUuidV4, Path, description = "Variable ID"),
        ("tier" = String, Path, description = "Environment tier"),
    ),
    responses(
        (status = 200, description = "Delete a value", body = DeleteValueResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Delete value",
    description = "Delete the value of a variable for one tier",
    operation_id = "delete-value",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_delete_value(
    State(ctx): State<Arc<VariableService>>,
    Path((application_id, variable_id, tier)): Path<(WrappedUuidV4, WrappedUuidV4, String)>,
    headers: HeaderMap,
) -> JsonResponse<DeleteValueResponse, CommonError> {
    trace!(%application_id, %variable_id, %tier, "Deleting value");
    let res = async {
        let tier = parse_tier(&tier)?;
        let actor = authenticate_optional(&ctx.repository, &headers).await?;
        delete_value(
            &ctx.repository,
            actor.as_ref(),
            application_id,
            variable_id,
            tier,
        )
        .await
    }
    .await;
    trace!(success = res.is_ok(), "Deleting value completed");
    JsonResponse::from(res)
}
