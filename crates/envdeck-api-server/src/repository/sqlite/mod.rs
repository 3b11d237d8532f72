//! SQLite repository implementation.

use anyhow::Context;
use shared::{
    error::CommonError,
    primitives::{
        FromSqlValue, PaginatedResponse, PaginationRequest, SqlMigrationLoader,
        WrappedChronoDateTime, WrappedUuidV4, decode_pagination_token,
    },
};
use shared_macros::load_sql_migrations;
use std::collections::BTreeMap;

use crate::logic::{
    access_token::AccessToken,
    application::Application,
    history::ChangeEntry,
    permission::Permission,
    tier::EnvironmentTier,
    user::User,
    variable::{EnvironmentValue, EnvironmentVariable},
};
use crate::repository::{
    AccessTokenRepositoryLike, ApplicationRepositoryLike, ChangeHistoryRepositoryLike,
    CreateAccessToken, CreateApplication, CreatePermission, CreateUser, CreateVariable,
    PermissionRepositoryLike, RecordChange, UpdateApplication, UpdateUser, UpdateVariable,
    UpsertValue, UserRepositoryLike, VariableRepositoryLike,
};

/// SQLite-backed repository
#[derive(Clone)]
pub struct Repository {
    conn: shared::libsql::Connection,
}

impl Repository {
    /// Create a new repository instance
    pub fn new(conn: shared::libsql::Connection) -> Self {
        Self { conn }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &shared::libsql::Connection {
        &self.conn
    }
}

impl SqlMigrationLoader for Repository {
    fn load_sql_migrations() -> BTreeMap<&'static str, BTreeMap<&'static str, &'static str>> {
        load_sql_migrations!("migrations")
    }
}

fn repository_error(e: anyhow::Error) -> CommonError {
    CommonError::Repository {
        msg: e.to_string(),
        source: Some(e),
    }
}

/// Read a typed column. Decoding goes through [`FromSqlValue`] because the
/// libsql crate does not let downstream types plug into `Row::get`.
fn column<T: FromSqlValue>(row: &libsql::Row, idx: i32) -> Result<T, CommonError> {
    T::from_sql(row.get_value(idx)?).map_err(repository_error)
}

/// Read a nullable column.
fn optional<T: FromSqlValue>(row: &libsql::Row, idx: i32) -> Result<Option<T>, CommonError> {
    match row.get_value(idx)? {
        libsql::Value::Null => Ok(None),
        value => Ok(Some(T::from_sql(value).map_err(repository_error)?)),
    }
}

fn nullable(value: Option<impl Into<libsql::Value>>) -> libsql::Value {
    value.map(Into::into).unwrap_or(libsql::Value::Null)
}

/// Decode a `(created_at, id)` cursor produced by the paginated listings.
fn decode_cursor(
    token: &str,
) -> Result<(WrappedChronoDateTime, WrappedUuidV4), CommonError> {
    let parts = decode_pagination_token(token).map_err(|e| CommonError::Repository {
        msg: format!("Invalid pagination token: {e}"),
        source: Some(e),
    })?;
    if parts.len() != 2 {
        return Err(CommonError::Repository {
            msg: "Invalid pagination token: wrong number of parts".to_string(),
            source: None,
        });
    }
    let created_at =
        WrappedChronoDateTime::try_from(parts[0].as_str()).map_err(|e| CommonError::Repository {
            msg: format!("Invalid datetime in pagination token: {e}"),
            source: Some(e),
        })?;
    let id = parts[1]
        .parse::<WrappedUuidV4>()
        .map_err(|e| CommonError::Repository {
            msg: format!("Invalid id in pagination token: {e}"),
            source: Some(e),
        })?;
    Ok((created_at, id))
}

fn map_application_row(row: &libsql::Row) -> Result<Application, CommonError> {
    Ok(Application {
        id: column(row, 0)?,
        name: column(row, 1)?,
        slug: column(row, 2)?,
        created_at: column(row, 3)?,
        updated_at: column(row, 4)?,
    })
}

fn map_variable_row(row: &libsql::Row) -> Result<EnvironmentVariable, CommonError> {
    Ok(EnvironmentVariable {
        id: column(row, 0)?,
        application_id: column(row, 1)?,
        name: column(row, 2)?,
        sequence: optional(row, 3)?,
        created_at: column(row, 4)?,
        updated_at: column(row, 5)?,
    })
}

fn map_value_row(row: &libsql::Row) -> Result<EnvironmentValue, CommonError> {
    Ok(EnvironmentValue {
        id: column(row, 0)?,
        variable_id: column(row, 1)?,
        tier: column(row, 2)?,
        value: column(row, 3)?,
        created_at: column(row, 4)?,
        updated_at: column(row, 5)?,
    })
}

fn map_user_row(row: &libsql::Row) -> Result<User, CommonError> {
    Ok(User {
        id: column(row, 0)?,
        name: column(row, 1)?,
        email: optional(row, 2)?,
        is_admin: column::<i64>(row, 3)? != 0,
        created_at: column(row, 4)?,
        updated_at: column(row, 5)?,
    })
}

fn map_permission_row(row: &libsql::Row) -> Result<Permission, CommonError> {
    Ok(Permission {
        id: column(row, 0)?,
        user_id: column(row, 1)?,
        tier: column(row, 2)?,
        application_id: optional(row, 3)?,
        created_at: column(row, 4)?,
    })
}

fn map_access_token_row(row: &libsql::Row) -> Result<AccessToken, CommonError> {
    Ok(AccessToken {
        id: column(row, 0)?,
        user_id: column(row, 1)?,
        name: column(row, 2)?,
        token: column(row, 3)?,
        created_at: column(row, 4)?,
        last_used_at: optional(row, 5)?,
    })
}

fn map_change_entry_row(row: &libsql::Row) -> Result<ChangeEntry, CommonError> {
    Ok(ChangeEntry {
        id: column(row, 0)?,
        application_id: column(row, 1)?,
        user_id: optional(row, 2)?,
        entity: column(row, 3)?,
        entity_id: column(row, 4)?,
        action: column(row, 5)?,
        detail: column(row, 6)?,
        created_at: column(row, 7)?,
    })
}

impl Repository {
    async fn query_row(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<libsql::Row>, CommonError> {
        let mut rows = self.conn.query(sql, params).await?;
        Ok(rows.next().await?)
    }

    async fn collect_rows<T>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        map: fn(&libsql::Row) -> Result<T, CommonError>,
    ) -> Result<Vec<T>, CommonError> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(map(&row)?);
        }
        Ok(items)
    }
}

#[async_trait::async_trait]
impl ApplicationRepositoryLike for Repository {
    async fn create_application(&self, params: &CreateApplication) -> Result<(), CommonError> {
        self.conn
            .execute(
                "INSERT INTO application (id, name, slug, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    params.id,
                    params.name.clone(),
                    params.slug.clone(),
                    params.created_at,
                    params.updated_at,
                ],
            )
            .await
            .context("Failed to create application")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn update_application(&self, params: &UpdateApplication) -> Result<(), CommonError> {
        self.conn
            .execute(
                "UPDATE application SET name = ?2, updated_at = ?3 WHERE id = ?1",
                libsql::params![params.id, params.name.clone(), params.updated_at],
            )
            .await
            .context("Failed to update application")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn delete_application(&self, id: &WrappedUuidV4) -> Result<(), CommonError> {
        self.conn
            .execute("DELETE FROM application WHERE id = ?1", libsql::params![*id])
            .await
            .context("Failed to delete application")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn get_application_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<Application>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, name, slug, created_at, updated_at FROM application WHERE id = ?1",
                libsql::params![*id],
            )
            .await?;
        row.as_ref().map(map_application_row).transpose()
    }

    async fn get_application_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Application>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, name, slug, created_at, updated_at FROM application WHERE slug = ?1",
                libsql::params![slug.to_string()],
            )
            .await?;
        row.as_ref().map(map_application_row).transpose()
    }

    async fn get_applications(
        &self,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResponse<Application>, CommonError> {
        let items = match &pagination.next_page_token {
            Some(token) => {
                let (created_at, id) = decode_cursor(token)?;
                self.collect_rows(
                    "SELECT id, name, slug, created_at, updated_at FROM application
                     WHERE created_at > ?1 OR (created_at = ?1 AND id > ?2)
                     ORDER BY created_at ASC, id ASC LIMIT ?3",
                    libsql::params![created_at, id, pagination.effective_page_size() + 1],
                    map_application_row,
                )
                .await?
            }
            None => {
                self.collect_rows(
                    "SELECT id, name, slug, created_at, updated_at FROM application
                     ORDER BY created_at ASC, id ASC LIMIT ?1",
                    libsql::params![pagination.effective_page_size() + 1],
                    map_application_row,
                )
                .await?
            }
        };

        Ok(PaginatedResponse::from_items_with_extra(
            items,
            pagination,
            |application| {
                vec![
                    application.created_at.get_inner().to_rfc3339(),
                    application.id.to_string(),
                ]
            },
        ))
    }
}

#[async_trait::async_trait]
impl VariableRepositoryLike for Repository {
    async fn create_variable(&self, params: &CreateVariable) -> Result<(), CommonError> {
        self.conn
            .execute(
                "INSERT INTO environment_variable
                     (id, application_id, name, sequence, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    params.id,
                    params.application_id,
                    params.name.clone(),
                    nullable(params.sequence),
                    params.created_at,
                    params.updated_at,
                ],
            )
            .await
            .context("Failed to create variable")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn update_variable(&self, params: &UpdateVariable) -> Result<(), CommonError> {
        self.conn
            .execute(
                "UPDATE environment_variable SET name = ?2, sequence = ?3, updated_at = ?4
                 WHERE id = ?1",
                libsql::params![
                    params.id,
                    params.name.clone(),
                    nullable(params.sequence),
                    params.updated_at,
                ],
            )
            .await
            .context("Failed to update variable")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn delete_variable(&self, id: &WrappedUuidV4) -> Result<(), CommonError> {
        self.conn
            .execute(
                "DELETE FROM environment_variable WHERE id = ?1",
                libsql::params![*id],
            )
            .await
            .context("Failed to delete variable")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn get_variable_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<EnvironmentVariable>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, application_id, name, sequence, created_at, updated_at
                 FROM environment_variable WHERE id = ?1",
                libsql::params![*id],
            )
            .await?;
        row.as_ref().map(map_variable_row).transpose()
    }

    async fn get_variable_by_name(
        &self,
        application_id: &WrappedUuidV4,
        name: &str,
    ) -> Result<Option<EnvironmentVariable>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, application_id, name, sequence, created_at, updated_at
                 FROM environment_variable WHERE application_id = ?1 AND name = ?2",
                libsql::params![*application_id, name.to_string()],
            )
            .await?;
        row.as_ref().map(map_variable_row).transpose()
    }

    async fn get_variables_for_application(
        &self,
        application_id: &WrappedUuidV4,
    ) -> Result<Vec<EnvironmentVariable>, CommonError> {
        // Generation order: explicit sequence first, then the rest by name
        self.collect_rows(
            "SELECT id, application_id, name, sequence, created_at, updated_at
             FROM environment_variable WHERE application_id = ?1
             ORDER BY sequence IS NULL, sequence ASC, name ASC",
            libsql::params![*application_id],
            map_variable_row,
        )
        .await
    }

    async fn upsert_value(&self, params: &UpsertValue) -> Result<(), CommonError> {
        self.conn
            .execute(
                "INSERT INTO environment_value
                     (id, variable_id, tier, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (variable_id, tier)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                libsql::params![
                    params.id,
                    params.variable_id,
                    params.tier,
                    params.value.clone(),
                    params.created_at,
                    params.updated_at,
                ],
            )
            .await
            .context("Failed to upsert value")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn delete_value(&self, id: &WrappedUuidV4) -> Result<(), CommonError> {
        self.conn
            .execute(
                "DELETE FROM environment_value WHERE id = ?1",
                libsql::params![*id],
            )
            .await
            .context("Failed to delete value")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn get_value(
        &self,
        variable_id: &WrappedUuidV4,
        tier: EnvironmentTier,
    ) -> Result<Option<EnvironmentValue>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, variable_id, tier, value, created_at, updated_at
                 FROM environment_value WHERE variable_id = ?1 AND tier = ?2",
                libsql::params![*variable_id, tier],
            )
            .await?;
        row.as_ref().map(map_value_row).transpose()
    }

    async fn get_values_for_variable(
        &self,
        variable_id: &WrappedUuidV4,
    ) -> Result<Vec<EnvironmentValue>, CommonError> {
        self.collect_rows(
            "SELECT id, variable_id, tier, value, created_at, updated_at
             FROM environment_value WHERE variable_id = ?1 ORDER BY tier ASC",
            libsql::params![*variable_id],
            map_value_row,
        )
        .await
    }
}

#[async_trait::async_trait]
impl UserRepositoryLike for Repository {
    async fn create_user(&self, params: &CreateUser) -> Result<(), CommonError> {
        self.conn
            .execute(
                "INSERT INTO \"user\" (id, name, email, is_admin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    params.id,
                    params.name.clone(),
                    nullable(params.email.clone()),
                    i64::from(params.is_admin),
                    params.created_at,
                    params.updated_at,
                ],
            )
            .await
            .context("Failed to create user")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn update_user(&self, params: &UpdateUser) -> Result<(), CommonError> {
        self.conn
            .execute(
                "UPDATE \"user\" SET name = ?2, email = ?3, updated_at = ?4 WHERE id = ?1",
                libsql::params![
                    params.id,
                    params.name.clone(),
                    nullable(params.email.clone()),
                    params.updated_at,
                ],
            )
            .await
            .context("Failed to update user")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn delete_user(&self, id: &WrappedUuidV4) -> Result<(), CommonError> {
        self.conn
            .execute("DELETE FROM \"user\" WHERE id = ?1", libsql::params![*id])
            .await
            .context("Failed to delete user")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn get_user_by_id(&self, id: &WrappedUuidV4) -> Result<Option<User>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, name, email, is_admin, created_at, updated_at
                 FROM \"user\" WHERE id = ?1",
                libsql::params![*id],
            )
            .await?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn get_users(
        &self,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResponse<User>, CommonError> {
        let items = match &pagination.next_page_token {
            Some(token) => {
                let (created_at, id) = decode_cursor(token)?;
                self.collect_rows(
                    "SELECT id, name, email, is_admin, created_at, updated_at FROM \"user\"
                     WHERE created_at > ?1 OR (created_at = ?1 AND id > ?2)
                     ORDER BY created_at ASC, id ASC LIMIT ?3",
                    libsql::params![created_at, id, pagination.effective_page_size() + 1],
                    map_user_row,
                )
                .await?
            }
            None => {
                self.collect_rows(
                    "SELECT id, name, email, is_admin, created_at, updated_at FROM \"user\"
                     ORDER BY created_at ASC, id ASC LIMIT ?1",
                    libsql::params![pagination.effective_page_size() + 1],
                    map_user_row,
                )
                .await?
            }
        };

        Ok(PaginatedResponse::from_items_with_extra(
            items,
            pagination,
            |user| {
                vec![
                    user.created_at.get_inner().to_rfc3339(),
                    user.id.to_string(),
                ]
            },
        ))
    }
}

#[async_trait::async_trait]
impl PermissionRepositoryLike for Repository {
    async fn create_permission(&self, params: &CreatePermission) -> Result<(), CommonError> {
        self.conn
            .execute(
                "INSERT INTO permission (id, user_id, tier, application_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    params.id,
                    params.user_id,
                    params.tier,
                    nullable(params.application_id),
                    params.created_at,
                ],
            )
            .await
            .context("Failed to create permission")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn delete_permission(&self, id: &WrappedUuidV4) -> Result<(), CommonError> {
        self.conn
            .execute("DELETE FROM permission WHERE id = ?1", libsql::params![*id])
            .await
            .context("Failed to delete permission")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn get_permission_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<Permission>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, user_id, tier, application_id, created_at
                 FROM permission WHERE id = ?1",
                libsql::params![*id],
            )
            .await?;
        row.as_ref().map(map_permission_row).transpose()
    }

    async fn get_permissions_for_user(
        &self,
        user_id: &WrappedUuidV4,
    ) -> Result<Vec<Permission>, CommonError> {
        self.collect_rows(
            "SELECT id, user_id, tier, application_id, created_at
             FROM permission WHERE user_id = ?1 ORDER BY created_at ASC, id ASC",
            libsql::params![*user_id],
            map_permission_row,
        )
        .await
    }

    async fn has_permission(
        &self,
        user_id: &WrappedUuidV4,
        tier: EnvironmentTier,
        application_id: Option<&WrappedUuidV4>,
    ) -> Result<bool, CommonError> {
        let row = match application_id {
            Some(application_id) => {
                self.query_row(
                    "SELECT 1 FROM permission
                     WHERE user_id = ?1 AND tier = ?2 AND application_id = ?3",
                    libsql::params![*user_id, tier, *application_id],
                )
                .await?
            }
            None => {
                self.query_row(
                    "SELECT 1 FROM permission
                     WHERE user_id = ?1 AND tier = ?2 AND application_id IS NULL",
                    libsql::params![*user_id, tier],
                )
                .await?
            }
        };
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl AccessTokenRepositoryLike for Repository {
    async fn create_access_token(&self, params: &CreateAccessToken) -> Result<(), CommonError> {
        self.conn
            .execute(
                "INSERT INTO access_token (id, user_id, name, token, created_at, last_used_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
                libsql::params![
                    params.id,
                    params.user_id,
                    params.name.clone(),
                    params.token.clone(),
                    params.created_at,
                ],
            )
            .await
            .context("Failed to create access token")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn delete_access_token(&self, id: &WrappedUuidV4) -> Result<(), CommonError> {
        self.conn
            .execute(
                "DELETE FROM access_token WHERE id = ?1",
                libsql::params![*id],
            )
            .await
            .context("Failed to delete access token")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn get_access_token_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<AccessToken>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, user_id, name, token, created_at, last_used_at
                 FROM access_token WHERE id = ?1",
                libsql::params![*id],
            )
            .await?;
        row.as_ref().map(map_access_token_row).transpose()
    }

    async fn get_access_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<AccessToken>, CommonError> {
        let row = self
            .query_row(
                "SELECT id, user_id, name, token, created_at, last_used_at
                 FROM access_token WHERE token = ?1",
                libsql::params![token.to_string()],
            )
            .await?;
        row.as_ref().map(map_access_token_row).transpose()
    }

    async fn get_access_tokens_for_user(
        &self,
        user_id: &WrappedUuidV4,
    ) -> Result<Vec<AccessToken>, CommonError> {
        self.collect_rows(
            "SELECT id, user_id, name, token, created_at, last_used_at
             FROM access_token WHERE user_id = ?1 ORDER BY created_at ASC, id ASC",
            libsql::params![*user_id],
            map_access_token_row,
        )
        .await
    }

    async fn touch_access_token(
        &self,
        id: &WrappedUuidV4,
        last_used_at: &WrappedChronoDateTime,
    ) -> Result<(), CommonError> {
        self.conn
            .execute(
                "UPDATE access_token SET last_used_at = ?2 WHERE id = ?1",
                libsql::params![*id, *last_used_at],
            )
            .await
            .context("Failed to touch access token")
            .map_err(repository_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChangeHistoryRepositoryLike for Repository {
    async fn record_change(&self, params: &RecordChange) -> Result<(), CommonError> {
        self.conn
            .execute(
                "INSERT INTO change_entry
                     (id, application_id, user_id, entity, entity_id, action, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                libsql::params![
                    params.id,
                    params.application_id,
                    nullable(params.user_id),
                    params.entity,
                    params.entity_id.clone(),
                    params.action,
                    params.detail.clone(),
                    params.created_at,
                ],
            )
            .await
            .context("Failed to record change")
            .map_err(repository_error)?;
        Ok(())
    }

    async fn get_changes_for_application(
        &self,
        application_id: &WrappedUuidV4,
        pagination: &PaginationRequest,
    ) -> Result<PaginatedResponse<ChangeEntry>, CommonError> {
        let items = match &pagination.next_page_token {
            Some(token) => {
                let (created_at, id) = decode_cursor(token)?;
                self.collect_rows(
                    "SELECT id, application_id, user_id, entity, entity_id, action, detail,
                            created_at
                     FROM change_entry
                     WHERE application_id = ?1
                       AND (created_at < ?2 OR (created_at = ?2 AND id < ?3))
                     ORDER BY created_at DESC, id DESC LIMIT ?4",
                    libsql::params![
                        *application_id,
                        created_at,
                        id,
                        pagination.effective_page_size() + 1
                    ],
                    map_change_entry_row,
                )
                .await?
            }
            None => {
                self.collect_rows(
                    "SELECT id, application_id, user_id, entity, entity_id, action, detail,
                            created_at
                     FROM change_entry
                     WHERE application_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2",
                    libsql::params![*application_id, pagination.effective_page_size() + 1],
                    map_change_entry_row,
                )
                .await?
            }
        };

        Ok(PaginatedResponse::from_items_with_extra(
            items,
            pagination,
            |entry| {
                vec![
                    entry.created_at.get_inner().to_rfc3339(),
                    entry.id.to_string(),
                ]
            },
        ))
    }
}
