use crate::error::CommonError;
use crate::libsql::{Connection, Migrations, apply_migrations, merge_nested_migrations};

/// Spin up an in-memory libsql database seeded with the given migrations.
///
/// The returned [`libsql::Database`] must be kept alive for the duration of
/// the test; dropping it closes the connection.
pub async fn setup_in_memory_database<'a>(
    migrations: Vec<Migrations<'a>>,
) -> Result<(libsql::Database, Connection), CommonError> {
    let db = libsql::Builder::new_local(":memory:").build().await?;
    let conn = Connection(db.connect()?);

    // Enable foreign key constraints
    conn.execute("PRAGMA foreign_keys = ON", ()).await?;

    let migrations_to_run = merge_nested_migrations(migrations);
    apply_migrations(&conn, &migrations_to_run).await?;

    Ok((db, conn))
}
