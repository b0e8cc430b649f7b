//! Embedded schema migrations.

use crate::DatabaseResult;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use escoffier_error::{DatabaseError, DatabaseErrorKind};
use tracing::info;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run pending migrations, returning the versions applied.
pub fn run_migrations(conn: &mut PgConnection) -> DatabaseResult<Vec<String>> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?
        .into_iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>();

    info!(count = applied.len(), "Applied migrations");
    Ok(applied)
}
