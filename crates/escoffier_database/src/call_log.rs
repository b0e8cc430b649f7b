//! PostgreSQL call log.

use crate::DatabaseResult;
use crate::connection::{DbPool, with_connection};
use crate::models::CallLogRow;
use crate::schema::generation_logs;
use async_trait::async_trait;
use diesel::prelude::*;
use escoffier_core::CallLogEntry;
use escoffier_error::EscoffierResult;
use escoffier_interface::CallLogSink;
use tracing::instrument;

/// Append-only call log in the `generation_logs` table.
#[derive(Debug, Clone)]
pub struct PostgresCallLog {
    pool: DbPool,
}

impl PostgresCallLog {
    /// Create a call log over a connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallLogSink for PostgresCallLog {
    #[instrument(skip(self, entry), fields(run_id = %entry.run_id, step = %entry.step, success = entry.success))]
    async fn append(&self, entry: &CallLogEntry) -> EscoffierResult<()> {
        let row = CallLogRow::from(entry);
        with_connection(&self.pool, move |conn| {
            diesel::insert_into(generation_logs::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn entries_for_run(&self, run_id: &str) -> EscoffierResult<Vec<CallLogEntry>> {
        let run_id = run_id.to_string();
        let entries = with_connection(&self.pool, move |conn| {
            generation_logs::table
                .filter(generation_logs::run_id.eq(run_id))
                .order(generation_logs::created_at.asc())
                .select(CallLogRow::as_select())
                .load(conn)?
                .into_iter()
                .map(CallLogEntry::try_from)
                .collect::<DatabaseResult<Vec<_>>>()
        })
        .await?;
        Ok(entries)
    }
}
