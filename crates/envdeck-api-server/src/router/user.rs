//! User HTTP endpoints

use axum::extract::{Json, Path, Query, State};
use axum::http::HeaderMap;
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::authenticate_manager,
    logic::user::{
        CreateUserRequest, CreateUserResponse, DeleteUserResponse, GetUserResponse,
        ListUsersResponse, UpdateUserRequest, UpdateUserResponse, create_user, delete_user,
        get_user_by_id, list_users, update_user,
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
pub const SERVICE_ROUTE_KEY: &str = "user";

#[derive(Clone)]
pub struct UserService {
    pub repository: Repository,
}

impl UserService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Create the user router
pub fn create_router() -> OpenApiRouter<Arc<UserService>> {
    OpenApiRouter::new()
        .routes(routes!(route_create_user))
        .routes(routes!(route_list_users))
        .routes(routes!(route_get_user))
        .routes(routes!(route_update_user))
        .routes(routes!(route_delete_user))
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Create a user", body = CreateUserResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Create user",
    description = "Create a new user. Admin only.",
    operation_id = "create-user",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_create_user(
    State(ctx): State<Arc<UserService>>,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> JsonResponse<CreateUserResponse, CommonError> {
    trace!(name = %request.name, "Creating user");
    let res = match authenticate_manager(&ctx.repository, &headers).await {
        Ok(_actor) => create_user(&ctx.repository, request).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Creating user completed");
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
        (status = 200, description = "List users", body = ListUsersResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List users",
    description = "List all users with pagination",
    operation_id = "list-users",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_list_users(
    State(ctx): State<Arc<UserService>>,
    Query(pagination): Query<PaginationRequest>,
) -> JsonResponse<ListUsersResponse, CommonError> {
    trace!(page_size = pagination.page_size, "Listing users");
    let res = list_users(&ctx.repository, pagination).await;
    trace!(success = res.is_ok(), "Listing users completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{user_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Get user by id", body = GetUserResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Get user",
    description = "Get a user by their ID",
    operation_id = "get-user",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_get_user(
    State(ctx): State<Arc<UserService>>,
    Path(user_id): Path<WrappedUuidV4>,
) -> JsonResponse<GetUserResponse, CommonError> {
    trace!(%user_id, "Getting user");
    let res = get_user_by_id(&ctx.repository, user_id).await;
    trace!(success = res.is_ok(), "Getting user completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    put,
    path = format!("{}/{}/{}/{{user_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Update a user", body = UpdateUserResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Update user",
    description = "Update a user's name and email. Admin only.",
    operation_id = "update-user",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_update_user(
    State(ctx): State<Arc<UserService>>,
    headers: HeaderMap,
    Path(user_id): Path<WrappedUuidV4>,
    Json(request): Json<UpdateUserRequest>,
) -> JsonResponse<UpdateUserResponse, CommonError> {
    trace!(%user_id, "Updating user");
    let res = match authenticate_manager(&ctx.repository, &headers).await {
        Ok(_actor) => update_user(&ctx.repository, user_id, request).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Updating user completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    delete,
    path = format!("{}/{}/{}/{{user_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Delete a user", body = DeleteUserResponse),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Delete user",
    description = "Delete a user along with their permissions and access tokens. Admin only.",
    operation_id = "delete-user",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_delete_user(
    State(ctx): State<Arc<UserService>>,
    headers: HeaderMap,
    Path(user_id): Path<WrappedUuidV4>,
) -> JsonResponse<DeleteUserResponse, CommonError> {
    trace!(%user_id, "Deleting user");
    let res = match authenticate_manager(&ctx.repository, &headers).await {
        Ok(_actor) => delete_user(&ctx.repository, user_id).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Deleting user completed");
    JsonResponse::from(res)
}
