use axum::Router;
use shared::adapters::openapi::API_VERSION_TAG;
use utoipa::openapi::tag::TagBuilder;
use utoipa::openapi::{Info, OpenApi};

use crate::ApiService;
use shared::error::CommonError;

pub(crate) mod access_token;
pub(crate) mod application;
pub(crate) mod env_file;
pub(crate) mod history;
pub(crate) mod permission;
pub(crate) mod user;
pub(crate) mod variable;

pub fn initiate_api_router(api_service: ApiService) -> Result<Router, CommonError> {
    let mut router = Router::new();

    // application router
    let (application_router, _) = application::create_router().split_for_parts();
    let application_router = application_router.with_state(api_service.application_service);
    router = router.merge(application_router);

    // variable router
    let (variable_router, _) = variable::create_router().split_for_parts();
    let variable_router = variable_router.with_state(api_service.variable_service);
    router = router.merge(variable_router);

    // env file router
    let (env_file_router, _) = env_file::create_router().split_for_parts();
    let env_file_router = env_file_router.with_state(api_service.env_file_service);
    router = router.merge(env_file_router);

    // history router
    let (history_router, _) = history::create_router().split_for_parts();
    let history_router = history_router.with_state(api_service.history_service);
    router = router.merge(history_router);

    // user router
    let (user_router, _) = user::create_router().split_for_parts();
    let user_router = user_router.with_state(api_service.user_service);
    router = router.merge(user_router);

    // permission router
    let (permission_router, _) = permission::create_router().split_for_parts();
    let permission_router = permission_router.with_state(api_service.permission_service);
    router = router.merge(permission_router);

    // access token router
    let (access_token_router, _) = access_token::create_router().split_for_parts();
    let access_token_router = access_token_router.with_state(api_service.access_token_service);
    router = router.merge(access_token_router);

    Ok(router)
}

pub fn generate_openapi_spec() -> OpenApi {
    let (_, mut spec) = application::create_router().split_for_parts();
    let (_, variable_spec) = variable::create_router().split_for_parts();
    let (_, env_file_spec) = env_file::create_router().split_for_parts();
    let (_, history_spec) = history::create_router().split_for_parts();
    let (_, user_spec) = user::create_router().split_for_parts();
    let (_, permission_spec) = permission::create_router().split_for_parts();
    let (_, access_token_spec) = access_token::create_router().split_for_parts();
    spec.merge(variable_spec);
    spec.merge(env_file_spec);
    spec.merge(history_spec);
    spec.merge(user_spec);
    spec.merge(permission_spec);
    spec.merge(access_token_spec);

    // Update OpenAPI metadata
    let mut info = Info::new(
        "envdeck",
        "Per-application environment variable management with permission-scoped env file downloads",
    );
    info.version = "v1".to_string();
    spec.info = info;

    // Add tag descriptions
    spec.tags = Some(vec![
        TagBuilder::new()
            .name("application")
            .description(Some(
                "Application endpoints for managing applications, their variables, tier values, env file downloads and change history",
            ))
            .build(),
        TagBuilder::new()
            .name("user")
            .description(Some(
                "User endpoints for managing users, their permissions and access tokens",
            ))
            .build(),
        TagBuilder::new()
            .name(API_VERSION_TAG)
            .description(Some("API version v1 endpoints"))
            .build(),
    ]);

    spec
}
