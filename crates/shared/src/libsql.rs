use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::Path;

use crate::error::CommonError;
use libsql::params::IntoParams;
use libsql::{BatchRows, Database, Rows};
use tracing::info;

/// Thin wrapper over [`libsql::Connection`] that retries busy/locked errors.
#[derive(Debug, Clone)]
pub struct Connection(pub libsql::Connection);

impl Connection {
    pub fn new(connection: libsql::Connection) -> Self {
        Self(connection)
    }
}

impl Deref for Connection {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[macro_export]
macro_rules! execute_with_retry {
    ($operation:expr) => {
        execute_with_retry!($operation, 10)
    };
    ($operation:expr, $max_retries:expr) => {{
        async {
            let mut _retries = 0u32;
            let _max_retries: u32 = $max_retries;

            loop {
                match $operation.await {
                    Ok(result) => break Ok(result),
                    Err(err) => {
                        let err_str = err.to_string();
                        if err_str.contains("database is locked") || err_str.contains("SQLITE_BUSY")
                        {
                            tracing::warn!("Database is locked, retrying... {:?}", err);
                            if _retries >= _max_retries {
                                break Err(err);
                            }

                            _retries += 1;

                            // Very low delay with exponential backoff
                            let delay_us = 10_000 * (1 << _retries.min(6));
                            tokio::time::sleep(std::time::Duration::from_micros(delay_us)).await;
                        } else {
                            tracing::error!("Error executing with retry: {:?}", err);
                            break Err(err);
                        }
                    }
                }
            }
        }
        .await
    }};
}

impl Connection {
    /// Execute sql query provided some type that implements [`IntoParams`] returning
    /// on success the number of rows that were changed.
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> libsql::Result<u64> {
        tracing::trace!("executing `{}`", sql);
        let params = params.into_params()?;
        execute_with_retry!(self.0.execute(sql, params.clone()), 10)
    }

    /// Execute a batch set of statements.
    pub async fn execute_batch(&self, sql: &str) -> libsql::Result<BatchRows> {
        tracing::trace!("executing batch `{}`", sql);
        execute_with_retry!(self.0.execute_batch(sql), 10)
    }

    /// Execute a batch set of statements atomically in a transaction.
    pub async fn execute_transactional_batch(&self, sql: &str) -> libsql::Result<BatchRows> {
        tracing::trace!("executing batch transactional `{}`", sql);
        execute_with_retry!(self.0.execute_transactional_batch(sql), 10)
    }

    /// Execute sql query provided some type that implements [`IntoParams`] returning
    /// on success the [`Rows`].
    pub async fn query(&self, sql: &str, params: impl IntoParams) -> libsql::Result<Rows> {
        let stmt = self.prepare(sql).await?;
        let params = params.into_params()?;
        execute_with_retry!(stmt.query(params.clone()), 10)
    }
}

pub type Migrations<'a> = BTreeMap<&'a str, BTreeMap<&'a str, &'a str>>;

pub fn merge_nested_migrations<'a>(mergable_migrations: Vec<Migrations<'a>>) -> Migrations<'a> {
    let mut target = Migrations::new();
    for other in mergable_migrations {
        for (outer_key, inner_map) in other {
            target
                .entry(outer_key)
                .and_modify(|existing_inner| {
                    for (inner_key, value) in inner_map.iter() {
                        existing_inner.insert(*inner_key, *value);
                    }
                })
                .or_insert(inner_map);
        }
    }
    target
}

/// Apply the `.up.sql` migrations for the sqlite backend, in filename order.
///
/// Migration files are written to be idempotent (`CREATE TABLE IF NOT
/// EXISTS`), so re-applying on startup against an existing database is safe.
pub async fn apply_migrations(
    conn: &Connection,
    migrations: &Migrations<'_>,
) -> Result<(), CommonError> {
    let migrations_to_run = migrations.get("sqlite").ok_or_else(|| {
        CommonError::Unknown(anyhow::anyhow!("no sqlite migrations present"))
    })?;

    let migrations_to_run = migrations_to_run
        .iter()
        .filter(|(filename, _)| filename.contains(".up."))
        .map(|(k, v)| (*k, *v))
        .collect::<BTreeMap<&str, &str>>();

    for (filename, contents) in migrations_to_run {
        tracing::debug!("applying migration `{}`", filename);
        conn.execute_batch(contents).await?;
    }

    Ok(())
}

/// Open (or create) the local database file and run migrations.
pub async fn establish_db_connection<'a>(
    db_path: &Path,
    migrations: Option<Migrations<'a>>,
) -> Result<(Database, Connection), CommonError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !std::fs::exists(parent)? {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!("establishing local connection at {}", db_path.display());
    let db = libsql::Builder::new_local(db_path).build().await?;
    let conn = Connection(db.connect()?);

    // Enforced per-connection in SQLite
    conn.execute("PRAGMA foreign_keys = ON", ()).await?;

    if let Some(migrations) = migrations {
        apply_migrations(&conn, &migrations).await?;
    }

    Ok((db, conn))
}
