//! Env file download endpoints, the external interface of the service.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::authenticate,
    logic::env_file::{EnvFile, download_env_file, download_env_file_with_token},
    logic::tier::EnvironmentTier,
    repository::Repository,
};
use shared::{error::CommonError, primitives::WrappedUuidV4};

pub const PATH_PREFIX: &str = "/api";
pub const API_VERSION_1: &str = "v1";
pub const SERVICE_ROUTE_KEY: &str = "application";

#[derive(Clone)]
pub struct EnvFileService {
    pub repository: Repository,
}

impl EnvFileService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Create the env file router
pub fn create_router() -> OpenApiRouter<Arc<EnvFileService>> {
    OpenApiRouter::new()
        .routes(routes!(route_download_env_file))
        .routes(routes!(route_download_env_file_with_token))
}

fn parse_tier(tier: &str) -> Result<EnvironmentTier, CommonError> {
    EnvironmentTier::parse(tier).ok_or_else(|| CommonError::InvalidRequest {
        msg: format!("'{tier}' is not a known environment tier"),
        source: None,
    })
}

fn attachment_response(file: EnvFile) -> Response {
    (
        [
            (
                http::header::CONTENT_TYPE,
                "text/plain; charset=utf-8".to_string(),
            ),
            (
                http::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.contents,
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{application_id}}/env/{{tier}}/download", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("tier" = String, Path, description = "Environment tier"),
    ),
    responses(
        (status = 200, description = "The rendered env file", body = String, content_type = "text/plain"),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 401, description = "Unauthorized", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Download env file",
    description = "Render and download the env file for a tier; the bearer token's user must hold the tier capability",
    operation_id = "download-env-file",
    security(
        ("bearer_token" = [])
    )
)]
async fn route_download_env_file(
    State(ctx): State<Arc<EnvFileService>>,
    Path((application_id, tier)): Path<(WrappedUuidV4, String)>,
    headers: HeaderMap,
) -> Result<Response, CommonError> {
    trace!(%application_id, %tier, "Downloading env file");
    let tier = parse_tier(&tier)?;
    let user_id = authenticate(&ctx.repository, &headers).await?;
    let file = download_env_file(&ctx.repository, &user_id, application_id, tier).await?;
    trace!(file_name = %file.file_name, "Downloading env file completed");
    Ok(attachment_response(file))
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{application_id}}/env/{{tier}}/download/{{token}}", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        ("tier" = String, Path, description = "Environment tier"),
        ("token" = String, Path, description = "Share token"),
    ),
    responses(
        (status = 200, description = "The rendered env file", body = String, content_type = "text/plain"),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 403, description = "Forbidden", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Download env file via share link",
    description = "Render and download the env file for a tier using a share token embedded in the URL",
    operation_id = "download-env-file-with-token",
    security(())
)]
async fn route_download_env_file_with_token(
    State(ctx): State<Arc<EnvFileService>>,
    Path((application_id, tier, token)): Path<(WrappedUuidV4, String, String)>,
) -> Result<Response, CommonError> {
    trace!(%application_id, %tier, "Downloading env file via share link");
    let tier = parse_tier(&tier)?;
    let file = download_env_file_with_token(&ctx.repository, &token, application_id, tier).await?;
    trace!(file_name = %file.file_name, "Downloading env file via share link completed");
    Ok(attachment_response(file))
}
