//! Change history HTTP endpoints

use axum::extract::{Path, Query, State};
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    logic::history::{ListChangeEntriesResponse, list_change_entries},
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
pub struct HistoryService {
    pub repository: Repository,
}

impl HistoryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

/// Create the history router
pub fn create_router() -> OpenApiRouter<Arc<HistoryService>> {
    OpenApiRouter::new().routes(routes!(route_list_change_entries))
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/{{application_id}}/history", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("application_id" = WrappedUuidV4, Path, description = "Application ID"),
        PaginationRequest
    ),
    responses(
        (status = 200, description = "List change entries", body = ListChangeEntriesResponse),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List change history",
    description = "List an application's change entries, newest first, with pagination",
    operation_id = "list-change-entries",
    security(
        (),
        ("bearer_token" = [])
    )
)]
async fn route_list_change_entries(
    State(ctx): State<Arc<HistoryService>>,
    Path(application_id): Path<WrappedUuidV4>,
    Query(pagination): Query<PaginationRequest>,
) -> JsonResponse<ListChangeEntriesResponse, CommonError> {
    trace!(%application_id, "Listing change entries");
    let res = list_change_entries(&ctx.repository, application_id, pagination).await;
    trace!(success = res.is_ok(), "Listing change entries completed");
    JsonResponse::from(res)
}
