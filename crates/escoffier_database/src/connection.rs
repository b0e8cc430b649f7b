//! Database connection utilities.

use crate::DatabaseResult;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use escoffier_error::{DatabaseError, DatabaseErrorKind};
use tracing::{debug, instrument};

/// Shared connection pool.
pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Build a connection pool and check out one connection to verify it.
///
/// # Errors
///
/// Returns an error if the pool cannot be built or the database is
/// unreachable.
#[instrument(skip(database_url))]
pub fn establish_pool(database_url: &str, pool_size: u32) -> DatabaseResult<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Pool(e.to_string())))?;

    // Warm up the pool by getting and immediately releasing a connection
    {
        let _conn = pool.get()?;
    }

    debug!("Connection pool ready");
    Ok(pool)
}

/// Build a pool from the `DATABASE_URL` environment variable.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is not set or the pool cannot be built.
pub fn establish_pool_from_env(pool_size: u32) -> DatabaseResult<DbPool> {
    let database_url = std::env::var("DATABASE_URL").map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Connection(
            "DATABASE_URL environment variable not set".to_string(),
        ))
    })?;
    establish_pool(&database_url, pool_size)
}

/// Run a blocking diesel operation on a pooled connection.
///
/// The connection is held only for the duration of `op`.
pub(crate) async fn with_connection<T, F>(pool: &DbPool, op: F) -> DatabaseResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> DatabaseResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        op(&mut conn)
    })
    .await
    .map_err(|e| {
        DatabaseError::new(DatabaseErrorKind::Connection(format!(
            "Database task failed: {e}"
        )))
    })?
}

/// Escape LIKE wildcards so `prefix` matches literally.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
