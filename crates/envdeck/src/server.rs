use std::path::PathBuf;

use shared::error::CommonError;
use tower_http::cors::CorsLayer;
use tracing::info;

use envdeck_api_server::{
    ApiService, InitApiServiceParams,
    logic::{
        access_token::{IssueAccessTokenRequest, issue_access_token},
        user::{CreateUserRequest, create_user},
    },
    repository::setup_repository,
    router::initiate_api_router,
};

pub struct ServeParams {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
}

pub async fn serve(params: ServeParams) -> Result<(), CommonError> {
    let (_db, _conn, repository) = setup_repository(&params.db_path).await?;

    let api_service = ApiService::new(InitApiServiceParams { repository })?;
    let router = initiate_api_router(api_service)?;
    let router = router.layer(CorsLayer::permissive());

    let addr = format!("{}:{}", params.host, params.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub struct BootstrapParams {
    pub name: String,
    pub db_path: PathBuf,
}

/// Create the first admin user and print their access token. Everything on
/// the management surface requires an admin bearer token, so a fresh
/// database needs this once before the HTTP API is usable.
pub async fn bootstrap(params: BootstrapParams) -> Result<(), CommonError> {
    let (_db, _conn, repository) = setup_repository(&params.db_path).await?;

    let user = create_user(
        &repository,
        CreateUserRequest {
            name: params.name,
            email: None,
            is_admin: true,
        },
    )
    .await?;

    let token = issue_access_token(
        &repository,
        user.id,
        IssueAccessTokenRequest {
            name: "bootstrap".to_string(),
        },
    )
    .await?;

    println!("admin user id: {}", user.id);
    println!("access token:  {}", token.token);
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => tracing::error!("failed to listen for shutdown signal: {e}"),
    }
}
