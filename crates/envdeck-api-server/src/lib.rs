use std::sync::Arc;

use shared::error::CommonError;

use crate::{
    repository::Repository,
    router::{
        access_token::AccessTokenService, application::ApplicationService,
        env_file::EnvFileService, history::HistoryService, permission::PermissionService,
        user::UserService, variable::VariableService,
    },
};

pub mod auth;
pub mod logic;
pub mod repository;
pub mod router;

#[derive(Clone)]
pub struct ApiService {
    pub application_service: Arc<ApplicationService>,
    pub variable_service: Arc<VariableService>,
    pub env_file_service: Arc<EnvFileService>,
    pub history_service: Arc<HistoryService>,
    pub user_service: Arc<UserService>,
    pub permission_service: Arc<PermissionService>,
    pub access_token_service: Arc<AccessTokenService>,
}

pub struct InitApiServiceParams {
    pub repository: Repository,
}

impl ApiService {
    pub fn new(init_params: InitApiServiceParams) -> Result<Self, CommonError> {
        let repository = init_params.repository;

        Ok(Self {
            application_service: Arc::new(ApplicationService::new(repository.clone())),
            variable_service: Arc::new(VariableService::new(repository.clone())),
            env_file_service: Arc::new(EnvFileService::new(repository.clone())),
            history_service: Arc::new(HistoryService::new(repository.clone())),
            user_service: Arc::new(UserService::new(repository.clone())),
            permission_service: Arc::new(PermissionService::new(repository.clone())),
            access_token_service: Arc::new(AccessTokenService::new(repository)),
        })
    }
}
