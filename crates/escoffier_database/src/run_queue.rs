//! PostgreSQL run queue with leased claims.

use crate::DatabaseResult;
use crate::connection::{DbPool, like_prefix, with_connection};
use crate::models::{NewRunRow, RunRow};
use crate::schema::generation_runs;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use diesel::prelude::*;
use escoffier_core::{GenerationRequest, QueueState, QueuedRun};
use escoffier_error::{DatabaseError, DatabaseErrorKind, EscoffierResult};
use escoffier_interface::RunQueue;
use std::time::Duration;
use tracing::{debug, instrument};

/// Run queue in the `generation_runs` table.
///
/// Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
/// same run.
#[derive(Debug, Clone)]
pub struct PostgresRunQueue {
    pool: DbPool,
}

impl PostgresRunQueue {
    /// Create a run queue over a connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn lease_expiry(now: DateTime<Utc>, lease: Duration) -> DatabaseResult<DateTime<Utc>> {
    TimeDelta::from_std(lease)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            DatabaseError::new(DatabaseErrorKind::Query(format!(
                "lease of {lease:?} is out of range"
            )))
        })
}

fn into_queued(rows: Vec<RunRow>) -> DatabaseResult<Vec<QueuedRun>> {
    rows.into_iter().map(QueuedRun::try_from).collect()
}

#[async_trait]
impl RunQueue for PostgresRunQueue {
    #[instrument(skip(self, request), fields(run_id = %request.run_id))]
    async fn enqueue(&self, request: &GenerationRequest) -> EscoffierResult<()> {
        let row = NewRunRow::try_from(request)?;
        with_connection(&self.pool, move |conn| {
            diesel::insert_into(generation_runs::table)
                .values(&row)
                .on_conflict(generation_runs::run_id)
                .do_nothing()
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self, lease))]
    async fn claim(
        &self,
        worker_id: &str,
        lease: Duration,
        limit: usize,
    ) -> EscoffierResult<Vec<QueuedRun>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let worker_id = worker_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let claimed = with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let now = Utc::now();
                let expires = lease_expiry(now, lease)?;
                let pending = QueueState::Pending.to_string();
                let claimed = QueueState::Claimed.to_string();

                let run_ids: Vec<String> = generation_runs::table
                    .filter(
                        generation_runs::state.eq(&pending).or(generation_runs::state
                            .eq(&claimed)
                            .and(generation_runs::lease_expires_at.le(now))),
                    )
                    .order(generation_runs::enqueued_at.asc())
                    .limit(limit)
                    .select(generation_runs::run_id)
                    .for_update()
                    .skip_locked()
                    .load(conn)?;

                if run_ids.is_empty() {
                    return Ok(Vec::new());
                }

                let rows = diesel::update(
                    generation_runs::table.filter(generation_runs::run_id.eq_any(&run_ids)),
                )
                .set((
                    generation_runs::state.eq(&claimed),
                    generation_runs::claimed_by.eq(&worker_id),
                    generation_runs::lease_expires_at.eq(expires),
                    generation_runs::dispatch_count.eq(generation_runs::dispatch_count + 1),
                    generation_runs::updated_at.eq(now),
                ))
                .returning(RunRow::as_returning())
                .get_results(conn)?;

                into_queued(rows)
            })
        })
        .await?;

        debug!(count = claimed.len(), "Claimed runs");
        Ok(claimed)
    }

    #[instrument(skip(self, lease))]
    async fn reclaim(&self, worker_id: &str, lease: Duration) -> EscoffierResult<Vec<QueuedRun>> {
        let worker_id = worker_id.to_string();
        let reclaimed = with_connection(&self.pool, move |conn| {
            let now = Utc::now();
            let rows = diesel::update(
                generation_runs::table
                    .filter(generation_runs::claimed_by.eq(&worker_id))
                    .filter(generation_runs::state.eq(QueueState::Claimed.to_string())),
            )
            .set((
                generation_runs::lease_expires_at.eq(lease_expiry(now, lease)?),
                generation_runs::updated_at.eq(now),
            ))
            .returning(RunRow::as_returning())
            .get_results(conn)?;
            into_queued(rows)
        })
        .await?;

        debug!(count = reclaimed.len(), "Reclaimed own runs");
        Ok(reclaimed)
    }

    #[instrument(skip(self, run_ids, lease), fields(count = run_ids.len()))]
    async fn renew(
        &self,
        worker_id: &str,
        run_ids: &[String],
        lease: Duration,
    ) -> EscoffierResult<()> {
        if run_ids.is_empty() {
            return Ok(());
        }
        let worker_id = worker_id.to_string();
        let run_ids = run_ids.to_vec();
        with_connection(&self.pool, move |conn| {
            let now = Utc::now();
            diesel::update(
                generation_runs::table
                    .filter(generation_runs::run_id.eq_any(&run_ids))
                    .filter(generation_runs::claimed_by.eq(&worker_id))
                    .filter(generation_runs::state.eq(QueueState::Claimed.to_string())),
            )
            .set((
                generation_runs::lease_expires_at.eq(lease_expiry(now, lease)?),
                generation_runs::updated_at.eq(now),
            ))
            .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn complete(&self, run_id: &str, error: Option<&str>) -> EscoffierResult<()> {
        let run_id = run_id.to_string();
        let state = if error.is_some() {
            QueueState::Failed
        } else {
            QueueState::Done
        };
        let error = error.map(str::to_string);

        with_connection(&self.pool, move |conn| {
            diesel::update(generation_runs::table.find(&run_id))
                .set((
                    generation_runs::state.eq(state.to_string()),
                    generation_runs::error.eq(error),
                    generation_runs::lease_expires_at.eq(None::<DateTime<Utc>>),
                    generation_runs::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_prefix(&self, prefix: &str) -> EscoffierResult<Vec<QueuedRun>> {
        let pattern = like_prefix(prefix);
        let runs = with_connection(&self.pool, move |conn| {
            let rows = generation_runs::table
                .filter(generation_runs::run_id.like(pattern))
                .order((
                    generation_runs::enqueued_at.asc(),
                    generation_runs::run_id.asc(),
                ))
                .select(RunRow::as_select())
                .load(conn)?;
            into_queued(rows)
        })
        .await?;
        Ok(runs)
    }
}
