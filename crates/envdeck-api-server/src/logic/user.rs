use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::{
    error::CommonError,
    primitives::{PaginatedResponse, PaginationRequest, WrappedChronoDateTime, WrappedUuidV4},
};
use utoipa::ToSchema;

use crate::repository::{CreateUser, UpdateUser, UserRepositoryLike};

/// Principal that permissions and access tokens attach to. Admins may
/// manage users, permissions and tokens; everyone else only gets what
/// their capability rows grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct User {
    pub id: WrappedUuidV4,
    pub name: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

pub type CreateUserResponse = User;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: Option<String>,
}

pub type UpdateUserResponse = User;

pub type GetUserResponse = User;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListUsersResponse {
    pub users: Vec<User>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct DeleteUserResponse {
    pub success: bool,
}

pub async fn create_user<R: UserRepositoryLike>(
    repository: &R,
    request: CreateUserRequest,
) -> Result<CreateUserResponse, CommonError> {
    if request.name.trim().is_empty() {
        return Err(CommonError::InvalidRequest {
            msg: "User name must not be empty".to_string(),
            source: None,
        });
    }

    let now = WrappedChronoDateTime::now();
    let id = WrappedUuidV4::new();

    let user = User {
        id,
        name: request.name.clone(),
        email: request.email.clone(),
        is_admin: request.is_admin,
        created_at: now,
        updated_at: now,
    };

    let create_params = CreateUser {
        id,
        name: request.name,
        email: request.email,
        is_admin: request.is_admin,
        created_at: now,
        updated_at: now,
    };

    repository.create_user(&create_params).await?;

    Ok(user)
}

pub async fn update_user<R: UserRepositoryLike>(
    repository: &R,
    id: WrappedUuidV4,
    request: UpdateUserRequest,
) -> Result<UpdateUserResponse, CommonError> {
    let existing = repository.get_user_by_id(&id).await?;
    let existing = existing.ok_or_else(|| CommonError::NotFound {
        msg: format!("User with id {id} not found"),
        lookup_id: id.to_string(),
        source: None,
    })?;

    if request.name.trim().is_empty() {
        return Err(CommonError::InvalidRequest {
            msg: "User name must not be empty".to_string(),
            source: None,
        });
    }

    let now = WrappedChronoDateTime::now();

    let update_params = UpdateUser {
        id,
        name: request.name.clone(),
        email: request.email.clone(),
        updated_at: now,
    };

    repository.update_user(&update_params).await?;

    Ok(User {
        id,
        name: request.name,
        email: request.email,
        is_admin: existing.is_admin,
        created_at: existing.created_at,
        updated_at: now,
    })
}

pub async fn get_user_by_id<R: UserRepositoryLike>(
    repository: &R,
    id: WrappedUuidV4,
) -> Result<GetUserResponse, CommonError> {
    let user = repository.get_user_by_id(&id).await?;
    let user = user.ok_or_else(|| CommonError::NotFound {
        msg: format!("User with id {id} not found"),
        lookup_id: id.to_string(),
        source: None,
    })?;

    Ok(user)
}

pub async fn list_users<R: UserRepositoryLike>(
    repository: &R,
    pagination: PaginationRequest,
) -> Result<ListUsersResponse, CommonError> {
    let paginated: PaginatedResponse<User> = repository.get_users(&pagination).await?;

    Ok(ListUsersResponse {
        users: paginated.items,
        next_page_token: paginated.next_page_token,
    })
}

pub async fn delete_user<R: UserRepositoryLike>(
    repository: &R,
    id: WrappedUuidV4,
) -> Result<DeleteUserResponse, CommonError> {
    let existing = repository.get_user_by_id(&id).await?;
    if existing.is_none() {
        return Err(CommonError::NotFound {
            msg: format!("User with id {id} not found"),
            lookup_id: id.to_string(),
            source: None,
        });
    }

    repository.delete_user(&id).await?;

    Ok(DeleteUserResponse { success: true })
}
