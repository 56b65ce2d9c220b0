//! Task engine: starting catalog tasks, crediting completions exactly
//! once and the wallet-connect flow

use crate::{deferred, referral, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result, TaskCondition, TaskStatus, TaskWithStatus, User};
use tapcoin_persistence::sqlite;
use tracing::info;

/// What happened when a task was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StartOutcome {
    /// Progress row set to `doing`; a deferred verification will decide
    /// the outcome at `run_at`
    VerificationScheduled { run_at: DateTime<Utc> },
    /// Progress row set to `doing`; completion is driven by a separate
    /// user action (wallet connect)
    Started,
    /// Nothing to start: this condition is tracked automatically and the
    /// milestone sweeps complete it when reached
    ExternallyTracked,
}

/// Start a task for a user. Community-join tasks get a deferred
/// verification; milestone tasks have nothing to start and are reported
/// as externally tracked.
pub async fn start(
    pool: &SqlitePool,
    user_id: i64,
    task_id: i64,
    now: DateTime<Utc>,
) -> Result<StartOutcome> {
    let task = sqlite::get_task(pool, task_id)
        .await?
        .ok_or(Error::TaskNotFound(task_id))?;

    if let Some(existing) = sqlite::get_user_task(pool, user_id, task_id).await? {
        match existing.status {
            TaskStatus::Done if !task.is_repeatable => return Err(Error::AlreadyDone(task.name)),
            TaskStatus::Doing => return Err(Error::InProgress),
            // Repeatable done tasks start over from scratch
            TaskStatus::Done | TaskStatus::NotStarted | TaskStatus::Failed => {}
        }
    }

    let condition = TaskCondition::parse(&task.condition)?;
    match condition {
        TaskCondition::JoinTelegramGroup
        | TaskCondition::JoinTwitterCommunity
        | TaskCondition::JoinTiktokCommunity => {
            sqlite::start_user_task(pool, user_id, task_id).await?;
            let run_at = now + Duration::seconds(deferred::VERIFICATION_DELAY_SECS);
            sqlite::enqueue_verification(pool, user_id, task_id, run_at, now).await?;
            info!(user_id, task_id, %run_at, "task started, verification scheduled");
            Ok(StartOutcome::VerificationScheduled { run_at })
        }
        TaskCondition::ConnectTonWallet => {
            sqlite::start_user_task(pool, user_id, task_id).await?;
            Ok(StartOutcome::Started)
        }
        TaskCondition::OpenAppDays(_)
        | TaskCondition::InviteActive(_)
        | TaskCondition::InvitePremium(_)
        | TaskCondition::GuessDailyWords(_)
        | TaskCondition::GuessCombo(_) => Ok(StartOutcome::ExternallyTracked),
    }
}

/// Complete a task and credit its reward, exactly once per (user, task)
/// pair. Returns the new balance for the call that actually completed
/// it and `None` when it was already done. A completed task's reward
/// counts as an earning, so the referrer's share accrues here too.
pub async fn complete_task(
    pool: &SqlitePool,
    user_id: i64,
    task_id: i64,
    progress: Option<&serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let task = sqlite::get_task(pool, task_id)
        .await?
        .ok_or(Error::TaskNotFound(task_id))?;

    let credited =
        sqlite::complete_and_credit(pool, user_id, task_id, task.reward, &task.name, progress, now)
            .await?;

    if let Some(balance) = credited {
        referral::propagate(pool, user_id, task.reward, now).await?;
        info!(user_id, task_id, reward = task.reward, balance, "task completed");
    }
    Ok(credited)
}

/// Complete the task registered under `condition`, if the catalog has
/// one. Milestone sweeps call this; an absent catalog entry or an
/// already-done task credits nothing.
pub(crate) async fn credit_condition(
    pool: &SqlitePool,
    user_id: i64,
    condition: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let Some(task) = sqlite::get_task_by_condition(pool, condition).await? else {
        return Ok(None);
    };

    let credited =
        sqlite::complete_and_credit(pool, user_id, task.id, task.reward, &task.name, None, now)
            .await?;
    if credited.is_some() {
        referral::propagate(pool, user_id, task.reward, now).await?;
        info!(user_id, task_id = task.id, condition, reward = task.reward, "milestone credited");
        return Ok(Some(task.id));
    }
    Ok(None)
}

/// Store the user's TON wallet address and complete the wallet-connect
/// task. Reconnecting later updates the address without paying again.
pub async fn connect_wallet(
    pool: &SqlitePool,
    user_id: i64,
    address: &str,
    now: DateTime<Utc>,
) -> Result<(User, Option<i64>)> {
    let address = address.trim();
    if address.is_empty() {
        return Err(Error::InvalidInput("empty wallet address".into()));
    }

    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;
        user.ton_wallet_address = Some(address.to_string());

        if sqlite::update_user(pool, &user).await? {
            let mut credited = None;
            if let Some(task) = sqlite::get_task_by_condition(pool, "connect_ton_wallet").await? {
                let progress = serde_json::json!({ "walletAddress": address });
                credited = complete_task(pool, user_id, task.id, Some(&progress), now).await?;
            }
            let user = sqlite::get_user(pool, user_id)
                .await?
                .ok_or(Error::UserNotFound(user_id))?;
            return Ok((user, credited));
        }
    }

    Err(Error::ConcurrentUpdate)
}

/// The whole catalog joined with the user's progress. Tasks the user
/// never touched come back as `not_started`.
pub async fn list_with_status(pool: &SqlitePool, user_id: i64) -> Result<Vec<TaskWithStatus>> {
    let tasks = sqlite::list_tasks(pool).await?;
    let user_tasks = sqlite::list_user_tasks(pool, user_id).await?;
    let by_task: std::collections::HashMap<i64, _> =
        user_tasks.into_iter().map(|ut| (ut.task_id, ut)).collect();

    Ok(tasks
        .into_iter()
        .map(|task| {
            let progress = by_task.get(&task.id);
            TaskWithStatus {
                id: task.id,
                name: task.name,
                description: task.description,
                reward: task.reward,
                condition: task.condition,
                image_link: task.image_link,
                is_repeatable: task.is_repeatable,
                status: progress.map(|p| p.status).unwrap_or(TaskStatus::NotStarted),
                rewards_claimed: progress.map(|p| p.rewards_claimed).unwrap_or(false),
                completed_at: progress.and_then(|p| p.completed_at),
                progress: progress.map(|p| p.progress.clone()),
            }
        })
        .collect())
}
