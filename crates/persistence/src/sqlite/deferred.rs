//! Restart-safe queue for delayed task verification. Jobs are claimed by
//! deleting the row, so two worker ticks can never pick up the same job.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result};

/// A scheduled verification for a (user, task) pair
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeferredJob {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub run_at: DateTime<Utc>,
}

/// Schedule a verification to run at `run_at`
pub async fn enqueue_verification(
    pool: &SqlitePool,
    user_id: i64,
    task_id: i64,
    run_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO deferred_verifications (user_id, task_id, run_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(task_id)
    .bind(run_at)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

/// Claim up to `limit` due jobs. Each returned job has already been
/// removed from the queue; a job that must be retried is re-enqueued by
/// the worker.
pub async fn claim_due_jobs(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<DeferredJob>> {
    let candidates: Vec<DeferredJob> = sqlx::query_as(
        r#"
        SELECT id, user_id, task_id, run_at
        FROM deferred_verifications
        WHERE run_at <= ?
        ORDER BY run_at
        LIMIT ?
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut claimed = Vec::with_capacity(candidates.len());
    for job in candidates {
        let result = sqlx::query("DELETE FROM deferred_verifications WHERE id = ?")
            .bind(job.id)
            .execute(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        // Zero rows deleted means another worker claimed it first
        if result.rows_affected() == 1 {
            claimed.push(job);
        }
    }

    Ok(claimed)
}

/// Number of jobs still waiting (test/introspection helper)
pub async fn pending_job_count(pool: &SqlitePool) -> Result<u32> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM deferred_verifications")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0 as u32)
}
