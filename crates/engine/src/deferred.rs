//! Deferred verification worker. Join-style tasks are not verified
//! inline at start; a queued job checks them shortly after. The queue
//! lives in the database, so pending verifications survive a restart,
//! and claiming a job removes it so no two ticks process the same one.

use crate::task;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tapcoin_core::{Error, Result, TaskCondition};
use tapcoin_networking::MembershipCheck;
use tapcoin_persistence::sqlite::{self, DeferredJob};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Delay between starting a join task and its first verification
pub const VERIFICATION_DELAY_SECS: i64 = 5;

/// Back-off before retrying after an external lookup failure
const RETRY_BACKOFF_SECS: i64 = 300;

/// How often the worker polls for due jobs
const POLL_INTERVAL_SECS: u64 = 5;

/// Jobs claimed per tick
const BATCH_SIZE: u32 = 16;

/// Handle to control the verification worker
pub struct DeferredWorkerHandle {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl DeferredWorkerHandle {
    /// Signal the worker to stop after its current tick
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop the worker and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Spawn the background verification loop
pub fn spawn_deferred_worker<M>(pool: SqlitePool, checker: Arc<M>) -> DeferredWorkerHandle
where
    M: MembershipCheck + 'static,
{
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();

    let handle = tokio::spawn(async move {
        info!("deferred verification worker started");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(POLL_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = loop_cancel.cancelled() => {
                    info!("deferred verification worker stopping");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = process_due(&pool, checker.as_ref(), Utc::now()).await {
                        error!("deferred verification tick failed: {e}");
                    }
                }
            }
        }
    });

    DeferredWorkerHandle { cancel, handle }
}

/// Claim and run every due job. Jobs whose external lookup failed are
/// re-enqueued with a back-off; everything else is settled one way or
/// the other. Returns how many tasks were completed.
pub async fn process_due<M: MembershipCheck>(
    pool: &SqlitePool,
    checker: &M,
    now: DateTime<Utc>,
) -> Result<u32> {
    let jobs = sqlite::claim_due_jobs(pool, now, BATCH_SIZE).await?;
    let mut completed = 0;

    for job in jobs {
        match run_job(pool, checker, &job, now).await {
            Ok(true) => completed += 1,
            Ok(false) => {}
            Err(Error::ExternalCheckFailed(reason)) => {
                warn!(
                    user_id = job.user_id,
                    task_id = job.task_id,
                    %reason,
                    "verification lookup failed, retrying later"
                );
                let retry_at = now + Duration::seconds(RETRY_BACKOFF_SECS);
                sqlite::enqueue_verification(pool, job.user_id, job.task_id, retry_at, now).await?;
            }
            Err(e) => {
                error!(user_id = job.user_id, task_id = job.task_id, "verification job dropped: {e}");
            }
        }
    }

    Ok(completed)
}

/// Run one claimed job. Returns true when the task was completed.
async fn run_job<M: MembershipCheck>(
    pool: &SqlitePool,
    checker: &M,
    job: &DeferredJob,
    now: DateTime<Utc>,
) -> Result<bool> {
    let Some(user) = sqlite::get_user(pool, job.user_id).await? else {
        warn!(user_id = job.user_id, "verification job for vanished user dropped");
        return Ok(false);
    };
    let task = sqlite::get_task(pool, job.task_id)
        .await?
        .ok_or(Error::TaskNotFound(job.task_id))?;

    match TaskCondition::parse(&task.condition)? {
        TaskCondition::JoinTelegramGroup => {
            if checker.is_member(&user.telegram_id).await? {
                let credited = task::complete_task(pool, user.id, task.id, None, now).await?;
                Ok(credited.is_some())
            } else {
                sqlite::reset_unfinished_user_task(pool, user.id, task.id).await?;
                info!(user_id = user.id, task_id = task.id, "membership not confirmed, task reset");
                Ok(false)
            }
        }
        // No API to verify these against; joining is taken on trust
        TaskCondition::JoinTwitterCommunity | TaskCondition::JoinTiktokCommunity => {
            let credited = task::complete_task(pool, user.id, task.id, None, now).await?;
            Ok(credited.is_some())
        }
        other => {
            warn!(user_id = user.id, task_id = task.id, condition = %other, "unexpected queued condition");
            Ok(false)
        }
    }
}
