//! UserTask progress rows. The conditional `status != 'done'` transition
//! here is what makes every reward credit at-most-once.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result, TaskStatus, UserTask};

#[derive(Debug, sqlx::FromRow)]
struct UserTaskRow {
    id: i64,
    user_id: i64,
    task_id: i64,
    status: String,
    progress: String,
    rewards_claimed: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl UserTaskRow {
    fn into_user_task(self) -> Result<UserTask> {
        Ok(UserTask {
            id: self.id,
            user_id: self.user_id,
            task_id: self.task_id,
            status: TaskStatus::parse(&self.status)?,
            progress: serde_json::from_str(&self.progress)
                .map_err(|e| Error::DatabaseError(e.to_string()))?,
            rewards_claimed: self.rewards_claimed,
            completed_at: self.completed_at,
        })
    }
}

const USER_TASK_COLUMNS: &str =
    "id, user_id, task_id, status, progress, rewards_claimed, completed_at";

/// Fetch the progress row for a (user, task) pair
pub async fn get_user_task(
    pool: &SqlitePool,
    user_id: i64,
    task_id: i64,
) -> Result<Option<UserTask>> {
    let query = format!("SELECT {USER_TASK_COLUMNS} FROM user_tasks WHERE user_id = ? AND task_id = ?");
    let row: Option<UserTaskRow> = sqlx::query_as(&query)
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(UserTaskRow::into_user_task).transpose()
}

/// All progress rows for a user
pub async fn list_user_tasks(pool: &SqlitePool, user_id: i64) -> Result<Vec<UserTask>> {
    let query = format!("SELECT {USER_TASK_COLUMNS} FROM user_tasks WHERE user_id = ?");
    let rows: Vec<UserTaskRow> = sqlx::query_as(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(UserTaskRow::into_user_task).collect()
}

/// Create or reset the row to `doing`, clearing progress and the claim
/// flag. The unique (user_id, task_id) index makes this a single row.
pub async fn start_user_task(pool: &SqlitePool, user_id: i64, task_id: i64) -> Result<UserTask> {
    sqlx::query(
        r#"
        INSERT INTO user_tasks (user_id, task_id, status, progress, rewards_claimed, completed_at)
        VALUES (?, ?, 'doing', '{}', 0, NULL)
        ON CONFLICT (user_id, task_id) DO UPDATE SET
            status = 'doing',
            progress = '{}',
            rewards_claimed = 0,
            completed_at = NULL
        "#,
    )
    .bind(user_id)
    .bind(task_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    get_user_task(pool, user_id, task_id)
        .await?
        .ok_or_else(|| Error::DatabaseError("user task vanished after upsert".into()))
}

/// Flip the row to `done` and credit the task reward, in one SQL
/// transaction. The row is created lazily for verifier-driven completions
/// that never went through `start`. Returns the new balance for the one
/// caller that wins the `status != 'done'` transition and `None` for
/// everyone else, so a reward can never be paid twice no matter how many
/// verifiers race.
pub async fn complete_and_credit(
    pool: &SqlitePool,
    user_id: i64,
    task_id: i64,
    reward: i64,
    reason: &str,
    progress: Option<&serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let progress_json = match progress {
        Some(value) => Some(
            serde_json::to_string(value).map_err(|e| Error::DatabaseError(e.to_string()))?,
        ),
        None => None,
    };

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO user_tasks (user_id, task_id, status, progress)
        VALUES (?, ?, 'not_started', '{}')
        "#,
    )
    .bind(user_id)
    .bind(task_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let flipped = sqlx::query(
        r#"
        UPDATE user_tasks SET
            status = 'done',
            rewards_claimed = 1,
            completed_at = ?,
            progress = COALESCE(?, progress)
        WHERE user_id = ? AND task_id = ? AND status != 'done'
        "#,
    )
    .bind(now)
    .bind(&progress_json)
    .bind(user_id)
    .bind(task_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if flipped.rows_affected() == 0 {
        return Ok(None);
    }

    // Task rewards are always positive, so no balance floor check here
    sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
        .bind(reward)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    sqlx::query("INSERT INTO transactions (user_id, amount, reason, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(reward)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let balance: (i64,) = sqlx::query_as("SELECT balance FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(Some(balance.0))
}

/// Put a row back to `not_started` after a verification came back
/// negative, so the user can try again. Finished rows are left alone.
pub async fn reset_unfinished_user_task(
    pool: &SqlitePool,
    user_id: i64,
    task_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE user_tasks SET status = 'not_started', progress = '{}'
        WHERE user_id = ? AND task_id = ? AND status != 'done'
        "#,
    )
    .bind(user_id)
    .bind(task_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Ids of every task the user has completed; the derived replacement for
/// keeping a second completed-tasks list on the user record.
pub async fn completed_task_ids(pool: &SqlitePool, user_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT task_id FROM user_tasks WHERE user_id = ? AND status = 'done' ORDER BY task_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}
