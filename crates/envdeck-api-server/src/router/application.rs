//! Application HTTP endpoints

use axum::extract::{Json, Path, Query, State};
use axum::http::HeaderMap;
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::authenticate_optional,
    logic::application::{
        CreateApplicationRequest, CreateApplicationResponse, DeleteApplicationResponse,
        GetApplicationResponse, ListApplicationsResponse, UpdateApplicationRequest,
        UpdateApplicationResponse, create_application, delete_application, get_application_by_id,
        list_applications, update_application,
    },
    repository::Repository,
};
use shared::{
    adapters::openapi::JsonResponse,
    error::CommonError,
    primitives::{PaginationRequest, WrappedUuidV4},
};

pub const PATH_PREFIX: &str = "/api";
pub const API_VERSION_1: &str = "v1";
pub const SERVICE_ROUTE_KEY: &str = "application";

#[derive(Clone)]
pub struct ApplicationService {
    pub repository: Repository,
}

impl ApplicationService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Create the application router
pub fn create_router() -> OpenApiRouter<Arc<ApplicationService>> {
    OpenApiRouter::new()
        .routes(routes!(route_create_application))
        .routes(routes!(route_list_applications))
        .routes(routes!(route_get_application))
        .routes(routes!(route_update_application))
        .routes(routes!(route_delete_application))
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    request_body = CreateApplicationRequest,
    responses(
        (status = 200, description = "Create an application", body = CreateApplicationResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Create application",
    description = "Create a new application; the slug is derived from the name when omitted",
    operation_id = "create-application",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_create_application(
    State(ctx): State<Arc<ApplicationService>>,
    headers: HeaderMap,
    Json(request): Json<CreateApplicationRequest>,
) -> JsonResponse<CreateApplicationResponse, CommonError> {
    trace!(name = %request.name, "Creating application");
    let res = match authenticate_optional(&ctx.repository, &headers).await {
        Ok(actor) => create_application(&ctx.repository, actor.as_ref(), request).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Creating application completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        PaginationRequest
    ),
    responses(
        (status = 200, description = "List applications", body = ListApplicationsResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List applications",
    description = "List all applications with pagination",
    operation_id = "list-applications",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_list_applications(
    State(ctx): State<Arc<ApplicationService>>,
    Query(pagination): Query<PaginationRequest>,
) -> JsonResponse<ListApplicationsResponse, CommonError> {
    trace!(page_size = pagination.page_size, "Listing applications");
    let res = list_applications(&ctx.repository, pagination).await;
    trace!(success = res.is_ok(), "Listing applications completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{application_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
    ),
    responses(
        (status = 200, description = "Get application by id", body = GetApplicationResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Get application",
    description = "Get an application by its ID",
    operation_id = "get-application",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_get_application(
    State(ctx): State<Arc<ApplicationService>>,
    Path(application_id): Path<WrappedUuidV4>,
) -> JsonResponse<GetApplicationResponse, CommonError> {
    trace!(%application_id, "Getting application");
    let res = get_application_by_id(&ctx.repository, application_id).await;
    trace!(success = res.is_ok(), "Getting application completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    put,
    path = format!("{}/{}/{}/{{application_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
    ),
    request_body = UpdateApplicationRequest,
    responses(
        (status = 200, description = "Update an application", body = UpdateApplicationResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Update application",
    description = "Rename an application; the slug is left unchanged",
    operation_id = "update-application",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_update_application(
    State(ctx): State<Arc<ApplicationService>>,
    Path(application_id): Path<WrappedUuidV4>,
    headers: HeaderMap,
    Json(request): Json<UpdateApplicationRequest>,
) -> JsonResponse<UpdateApplicationResponse, CommonError> {
    trace!(%application_id, "Updating application");
    let res = match authenticate_optional(&ctx.repository, &headers).await {
        Ok(actor) => {
            update_application(&ctx.repository, actor.as_ref(), application_id, request).await
        }
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Updating application completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    delete,
    path = format!("{}/{}/{}/{{application_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
    ),
    responses(
        (status = 200, description = "Delete an application", body = DeleteApplicationResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Delete application",
    description = "Delete an application along with its variables, values and history",
    operation_id = "delete-application",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_delete_application(
    State(ctx): State<Arc<ApplicationService>>,
    Path(application_id): Path<WrappedUuidV4>,
    headers: HeaderMap,
) -> JsonResponse<DeleteApplicationResponse, CommonError> {
    trace!(%application_id, "Deleting application");
    let res = match authenticate_optional(&ctx.repository, &headers).await {
        Ok(actor) => delete_application(&ctx.repository, actor.as_ref(), application_id).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Deleting application completed");
    JsonResponse::from(res)
}
