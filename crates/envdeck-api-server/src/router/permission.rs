//! Permission HTTP endpoints

use axum::extract::{Json, Path, State};
use axum::http::HeaderMap;
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::authenticate_manager,
    logic::permission::{
        GrantPermissionRequest, GrantPermissionResponse, ListPermissionsResponse,
        RevokePermissionResponse, grant_permission, list_permissions, revoke_permission,
    },
    repository::Repository,
};
use shared::{adapters::openapi::JsonResponse, error::CommonError, primitives::WrappedUuidV4};

pub const PATH_PREFIX: &str = "/api";
pub const API_VERSION_1: &str = "v1";
pub const SERVICE_ROUTE_KEY: &str = "user";

#[derive(Clone)]
pub struct PermissionService {
    pub repository: Repository,
}

impl PermissionService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Create the permission router
pub fn create_router() -> OpenApiRouter<Arc<PermissionService>> {
    OpenApiRouter::new()
        .routes(routes!(route_grant_permission))
        .routes(routes!(route_list_permissions))
        .routes(routes!(route_revoke_permission))
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}/{{user_id}}/permission", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
    ),
    request_body = GrantPermissionRequest,
    responses(
        (status = 200, description = "Grant a permission", body = GrantPermissionResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Grant permission",
    description = "Grant a user a tier capability, optionally scoped to one application. Admin only.",
    operation_id = "grant-permission",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_grant_permission(
    State(ctx): State<Arc<PermissionService>>,
    headers: HeaderMap,
    Path(user_id): Path<WrappedUuidV4>,
    Json(request): Json<GrantPermissionRequest>,
) -> JsonResponse<GrantPermissionResponse, CommonError> {
    trace!(%user_id, tier = %request.tier, "Granting permission");
    let res = match authenticate_manager(&ctx.repository, &headers).await {
        Ok(_actor) => grant_permission(&ctx.repository, user_id, request).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Granting permission completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{user_id}}/permission", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "List permissions", body = ListPermissionsResponse),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List permissions",
    description = "List a user's permissions",
    operation_id = "list-permissions",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_list_permissions(
    State(ctx): State<Arc<PermissionService>>,
    Path(user_id): Path<WrappedUuidV4>,
) -> JsonResponse<ListPermissionsResponse, CommonError> {
    trace!(%user_id, "Listing permissions");
    let res = list_permissions(&ctx.repository, user_id).await;
    trace!(success = res.is_ok(), "Listing permissions completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    delete,
    path = format!("{}/{}/{}/{{user_id}}/permission/{{permission_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
        ("permission_id" = WrappedUuidV4, Path, description = "Permission ID"),
    ),
    responses(
        (status = 200, description = "Revoke a permission", body = RevokePermissionResponse),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Revoke permission",
    description = "Revoke a previously granted permission. Admin only.",
    operation_id = "revoke-permission",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_revoke_permission(
    State(ctx): State<Arc<PermissionService>>,
    headers: HeaderMap,
    Path((user_id, permission_id)): Path<(WrappedUuidV4, WrappedUuidV4)>,
) -> JsonResponse<RevokePermissionResponse, CommonError> {
    trace!(%user_id, %permission_id, "Revoking permission");
    let res = match authenticate_manager(&ctx.repository, &headers).await {
        Ok(_actor) => revoke_permission(&ctx.repository, user_id, permission_id).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Revoking permission completed");
    JsonResponse::from(res)
}
