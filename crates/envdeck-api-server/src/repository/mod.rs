//! Repository layer: trait definitions and the SQLite implementation.

pub mod sqlite;

use async_trait::async_trait;
use shared::{
    error::CommonError,
    primitives::{PaginatedResponse, PaginationRequest, WrappedChronoDateTime, WrappedUuidV4},
};
use std::path::Path;
use tracing::debug;

pub use sqlite::Repository;

use crate::logic::{
    access_token::AccessToken,
    application::Application,
    history::{ChangeAction, ChangeEntity, ChangeEntry},
    permission::Permission,
    tier::EnvironmentTier,
    user::User,
    variable::{EnvironmentValue, EnvironmentVariable},
};

use shared::libsql::establish_db_connection;
use shared::primitives::SqlMigrationLoader;

/// Open the database at `db_path`, run migrations and hand back the
/// repository. The returned [`libsql::Database`] must outlive the
/// connection.
pub async fn setup_repository(
    db_path: &Path,
) -> Result<(libsql::Database, shared::libsql::Connection, Repository), CommonError> {
    debug!("db_path: {}", db_path.display());
    let migrations = <Repository as SqlMigrationLoader>::load_sql_migrations();
    let (db, conn) = establish_db_connection(db_path, Some(migrations)).await?;

    let repo = Repository::new(conn.clone());
    Ok((db, conn, repo))
}

/// Parameters for creating a new application
#[derive(Debug, Clone)]
pub struct CreateApplication {
    pub id: WrappedUuidV4,
    pub name: String,
    pub slug: String,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for updating an existing application
#[derive(Debug, Clone)]
pub struct UpdateApplication {
    pub id: WrappedUuidV4,
    pub name: String,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for creating a new variable
#[derive(Debug, Clone)]
pub struct CreateVariable {
    pub id: WrappedUuidV4,
    pub application_id: WrappedUuidV4,
    pub name: String,
    pub sequence: Option<i64>,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for updating an existing variable
#[derive(Debug, Clone)]
pub struct UpdateVariable {
    pub id: WrappedUuidV4,
    pub name: String,
    pub sequence: Option<i64>,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for writing a tier value, inserting or replacing
#[derive(Debug, Clone)]
pub struct UpsertValue {
    pub id: WrappedUuidV4,
    pub variable_id: WrappedUuidV4,
    pub tier: EnvironmentTier,
    pub value: String,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: WrappedUuidV4,
    pub name: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for updating an existing user
#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub id: WrappedUuidV4,
    pub name: String,
    pub email: Option<String>,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for creating a new permission
#[derive(Debug, Clone)]
pub struct CreatePermission {
    pub id: WrappedUuidV4,
    pub user_id: WrappedUuidV4,
    pub tier: EnvironmentTier,
    pub application_id: Option<WrappedUuidV4>,
    pub created_at: WrappedChronoDateTime,
}

/// Parameters for creating a new access token
#[derive(Debug, Clone)]
pub struct CreateAccessToken {
    pub id: WrappedUuidV4,
    pub user_id: WrappedUuidV4,
    pub name: String,
    pub token: String,
    pub created_at: WrappedChronoDateTime,
}

/// Parameters for appending a change-history entry
#[derive(Debug, Clone)]
pub struct RecordChange {
    pub id: WrappedUuidV4,
    pub application_id: WrappedUuidV4,
    pub user_id: Option<WrappedUuidV4>,
    pub entity: ChangeEntity,
    pub entity_id: String,
    pub action: ChangeAction,
    pub detail: String,
    pub created_at: WrappedChronoDateTime,
}

/// Repository trait for application operations
#[async_trait]
pub trait ApplicationRepositoryLike: Send + Sync {
    /// Create a new application
    async fn create_application(&self, params: &CreateApplication) -> Result<(), CommonError>;

    /// Update an existing application
    async fn update_application(&self, params: &UpdateApplication) -> Result<(), CommonError>;

    /// Delete an application by ID
    async fn delete_application(&self, id: &WrappedUuidV4) -> Result<(), CommonError>;

    /// Get an application by ID
    async fn get_application_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<Application>, CommonError>;

    /// Get an application by slug
    async fn get_application_by_slug(&self, slug: &str)
    -> Result<Option<Application>, CommonError>;

    /// List applications with pagination
    async fn get_applications(
        &self,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResponse<Application>, CommonError>;
}

/// Repository trait for variable and value operations
#[async_trait]
pub trait VariableRepositoryLike: Send + Sync {
    /// Create a new variable
    async fn create_variable(&self, params: &CreateVariable) -> Result<(), CommonError>;

    /// Update an existing variable
    async fn update_variable(&self, params: &UpdateVariable) -> Result<(), CommonError>;

    /// Delete a variable by ID
    async fn delete_variable(&self, id: &WrappedUuidV4) -> Result<(), CommonError>;

    /// Get a variable by ID
    async fn get_variable_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<EnvironmentVariable>, CommonError>;

    /// Get a variable by name within an application
    async fn get_variable_by_name(
        &self,
        application_id: &WrappedUuidV4,
        name: &str,
    ) -> Result<Option<EnvironmentVariable>, CommonError>;

    /// List an application's variables in generation order
    async fn get_variables_for_application(
        &self,
        application_id: &WrappedUuidV4,
    ) -> Result<Vec<EnvironmentVariable>, CommonError>;

    /// Insert or replace a tier value
    async fn upsert_value(&self, params: &UpsertValue) -> Result<(), CommonError>;

    /// Delete a value by ID
    async fn delete_value(&self, id: &WrappedUuidV4) -> Result<(), CommonError>;

    /// Get the value of a variable for one tier
    async fn get_value(
        &self,
        variable_id: &WrappedUuidV4,
        tier: EnvironmentTier,
    ) -> Result<Option<EnvironmentValue>, CommonError>;

    /// List all tier values of a variable
    async fn get_values_for_variable(
        &self,
        variable_id: &WrappedUuidV4,
    ) -> Result<Vec<EnvironmentValue>, CommonError>;
}

/// Repository trait for user operations
#[async_trait]
pub trait UserRepositoryLike: Send + Sync {
    /// Create a new user
    async fn create_user(&self, params: &CreateUser) -> Result<(), CommonError>;

    /// Update an existing user
    async fn update_user(&self, params: &UpdateUser) -> Result<(), CommonError>;

    /// Delete a user by ID
    async fn delete_user(&self, id: &WrappedUuidV4) -> Result<(), CommonError>;

    /// Get a user by ID
    async fn get_user_by_id(&self, id: &WrappedUuidV4) -> Result<Option<User>, CommonError>;

    /// List users with pagination
    async fn get_users(
        &self,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResponse<User>, CommonError>;
}

/// Repository trait for permission operations
#[async_trait]
pub trait PermissionRepositoryLike: Send + Sync {
    /// Create a new permission
    async fn create_permission(&self, params: &CreatePermission) -> Result<(), CommonError>;

    /// Delete a permission by ID
    async fn delete_permission(&self, id: &WrappedUuidV4) -> Result<(), CommonError>;

    /// Get a permission by ID
    async fn get_permission_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<Permission>, CommonError>;

    /// List a user's permissions
    async fn get_permissions_for_user(
        &self,
        user_id: &WrappedUuidV4,
    ) -> Result<Vec<Permission>, CommonError>;

    /// Check whether an exact capability row exists. `application_id` of
    /// `None` matches only the global row.
    async fn has_permission(
        &self,
        user_id: &WrappedUuidV4,
        tier: EnvironmentTier,
        application_id: Option<&WrappedUuidV4>,
    ) -> Result<bool, CommonError>;
}

/// Repository trait for access token operations
#[async_trait]
pub trait AccessTokenRepositoryLike: Send + Sync {
    /// Create a new access token
    async fn create_access_token(&self, params: &CreateAccessToken) -> Result<(), CommonError>;

    /// Delete an access token by ID
    async fn delete_access_token(&self, id: &WrappedUuidV4) -> Result<(), CommonError>;

    /// Get an access token by ID
    async fn get_access_token_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<AccessToken>, CommonError>;

    /// Get an access token by its secret value
    async fn get_access_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<AccessToken>, CommonError>;

    /// List a user's access tokens
    async fn get_access_tokens_for_user(
        &self,
        user_id: &WrappedUuidV4,
    ) -> Result<Vec<AccessToken>, CommonError>;

    /// Stamp the token's last use
    async fn touch_access_token(
        &self,
        id: &WrappedUuidV4,
        last_used_at: &WrappedChronoDateTime,
    ) -> Result<(), CommonError>;
}

/// Repository trait for change-history operations
#[async_trait]
pub trait ChangeHistoryRepositoryLike: Send + Sync {
    /// Append a change entry
    async fn record_change(&self, params: &RecordChange) -> Result<(), CommonError>;

    /// List an application's change entries, newest first, with pagination
    async fn get_changes_for_application(
        &self,
        application_id: &WrappedUuidV4,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResponse<ChangeEntry>, CommonError>;
}
