//! Access token HTTP endpoints

use axum::extract::{Json, Path, State};
use axum::http::HeaderMap;
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::authenticate_self_or_manager,
    logic::access_token::{
        IssueAccessTokenRequest, IssueAccessTokenResponse, ListAccessTokensResponse,
        RevokeAccessTokenResponse, issue_access_token, list_access_tokens, revoke_access_token,
    },
    repository::Repository,
};
use shared::{adapters::openapi::JsonResponse, error::CommonError, primitives::WrappedUuidV4};

pub const PATH_PREFIX: &str = "/api";
pub const API_VERSION_1: &str = "v1";
pub const SERVICE_ROUTE_KEY: &str = "user";

#[derive(Clone)]
pub struct AccessTokenService {
    pub repository: Repository,
}

impl AccessTokenService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Create the access token router
pub fn create_router() -> OpenApiRouter<Arc<AccessTokenService>> {
    OpenApiRouter::new()
        .routes(routes!(route_issue_access_token))
        .routes(routes!(route_list_access_tokens))
        .routes(routes!(route_revoke_access_token))
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}/{{user_id}}/token", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
    ),
    request_body = IssueAccessTokenRequest,
    responses(
        (status = 200, description = "Issue an access token", body = IssueAccessTokenResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Issue access token",
    description = "Issue a new access token for a user; the secret value is only returned here. Callers may mint tokens for themselves, admins for anyone.",
    operation_id = "issue-access-token",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_issue_access_token(
    State(ctx): State<Arc<AccessTokenService>>,
    headers: HeaderMap,
    Path(user_id): Path<WrappedUuidV4>,
    Json(request): Json<IssueAccessTokenRequest>,
) -> JsonResponse<IssueAccessTokenResponse, CommonError> {
    trace!(%user_id, name = %request.name, "Issuing access token");
    let res = match authenticate_self_or_manager(&ctx.repository, &headers, &user_id).await {
        Ok(_actor) => issue_access_token(&ctx.repository, user_id, request).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Issuing access token completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{user_id}}/token", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "List access tokens", body = ListAccessTokensResponse),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List access tokens",
    description = "List a user's access tokens",
    operation_id = "list-access-tokens",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_list_access_tokens(
    State(ctx): State<Arc<AccessTokenService>>,
    Path(user_id): Path<WrappedUuidV4>,
) -> JsonResponse<ListAccessTokensResponse, CommonError> {
    trace!(%user_id, "Listing access tokens");
    let res = list_access_tokens(&ctx.repository, user_id).await;
    trace!(success = res.is_ok(), "Listing access tokens completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    delete,
    path = format!("{}/{}/{}/{{user_id}}/token/{{token_id}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("user_id" = WrappedUuidV4, Path, description = "User ID"),
        ("token_id" = WrappedUuidV4, Path, description = "Access token ID"),
    ),
    responses(
        (status = 200, description = "Revoke an access token", body = RevokeAccessTokenResponse),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Revoke access token",
    description = "Revoke an access token; any share links embedding it stop working. Callers may revoke their own tokens, admins anyone's.",
    operation_id = "revoke-access-token",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_revoke_access_token(
    State(ctx): State<Arc<AccessTokenService>>,
    headers: HeaderMap,
    Path((user_id, token_id)): Path<(WrappedUuidV4, WrappedUuidV4)>,
) -> JsonResponse<RevokeAccessTokenResponse, CommonError> {
    trace!(%user_id, %token_id, "Revoking access token");
    let res = match authenticate_self_or_manager(&ctx.repository, &headers, &user_id).await {
        Ok(_actor) => revoke_access_token(&ctx.repository, user_id, token_id).await,
        Err(e) => Err(e),
    };
    trace!(success = res.is_ok(), "Revoking access token completed");
    JsonResponse::from(res)
}
