//! Task catalog reads and the default seed set

use sqlx::SqlitePool;
use tapcoin_core::{Error, Result, Task};

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    name: String,
    description: String,
    reward: i64,
    condition: String,
    image_link: String,
    is_repeatable: bool,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            name: row.name,
            description: row.description,
            reward: row.reward,
            condition: row.condition,
            image_link: row.image_link,
            is_repeatable: row.is_repeatable,
        }
    }
}

const TASK_COLUMNS: &str =
    "id, name, description, reward, condition, image_link, is_repeatable";

/// Fetch a catalog entry by id
pub async fn get_task(pool: &SqlitePool, task_id: i64) -> Result<Option<Task>> {
    let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
    let row: Option<TaskRow> = sqlx::query_as(&query)
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Task::from))
}

/// Fetch a catalog entry by its symbolic condition
pub async fn get_task_by_condition(pool: &SqlitePool, condition: &str) -> Result<Option<Task>> {
    let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE condition = ?");
    let row: Option<TaskRow> = sqlx::query_as(&query)
        .bind(condition)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Task::from))
}

/// Fetch the whole catalog
pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<Task>> {
    let query = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id");
    let rows: Vec<TaskRow> = sqlx::query_as(&query)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Task::from).collect())
}

/// Insert a catalog entry (admin/seed path)
pub async fn insert_task(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    reward: i64,
    condition: &str,
    image_link: &str,
    is_repeatable: bool,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO tasks (name, description, reward, condition, image_link, is_repeatable)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(reward)
    .bind(condition)
    .bind(image_link)
    .bind(is_repeatable)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

/// The stock catalog: community joins, open-app and referral milestones,
/// guessing streak thresholds and the wallet connect bonus. Inserting is
/// keyed on the unique name, so re-seeding is a no-op.
const DEFAULT_TASKS: &[(&str, &str, i64, &str)] = &[
    (
        "Join Telegram Community",
        "Join our official Telegram community to stay updated.",
        100,
        "join_telegram_group",
    ),
    (
        "Join Twitter Community",
        "Follow and join our official Twitter community.",
        150,
        "join_twitter_community",
    ),
    (
        "Join TikTok Community",
        "Follow and join our official TikTok community.",
        150,
        "join_tiktok_community",
    ),
    (
        "Open App for 7 Days in a Row",
        "Open the app every day for 7 consecutive days.",
        200,
        "open_app_7_days",
    ),
    (
        "Open App for 30 Days in a Row",
        "Open the app every day for 30 consecutive days.",
        500,
        "open_app_30_days",
    ),
    (
        "Open App for 100 Days in a Row",
        "Open the app every day for 100 consecutive days.",
        1000,
        "open_app_100_days",
    ),
    (
        "Invite 10 Active Referrals",
        "Invite 10 active users to join the app.",
        200,
        "invite_active_10",
    ),
    (
        "Invite 30 Active Referrals",
        "Invite 30 active users to join the app.",
        500,
        "invite_active_30",
    ),
    (
        "Invite 50 Active Referrals",
        "Invite 50 active users to join the app.",
        800,
        "invite_active_50",
    ),
    (
        "Invite 100 Active Referrals",
        "Invite 100 active users to join the app.",
        1500,
        "invite_active_100",
    ),
    (
        "Invite 10 Premium Referral Users",
        "Invite 10 premium users to join the app.",
        300,
        "invite_premium_10",
    ),
    (
        "Invite 20 Premium Referral Users",
        "Invite 20 premium users to join the app.",
        600,
        "invite_premium_20",
    ),
    (
        "Invite 50 Premium Referral Users",
        "Invite 50 premium users to join the app.",
        1000,
        "invite_premium_50",
    ),
    (
        "Invite 100 Premium Referral Users",
        "Invite 100 premium users to join the app.",
        2000,
        "invite_premium_100",
    ),
    (
        "Guess Daily Words for 7 Days in a Row",
        "Guess the daily word correctly for 7 consecutive days.",
        250,
        "guess_daily_words_7",
    ),
    (
        "Guess Daily Words for 30 Days in a Row",
        "Guess the daily word correctly for 30 consecutive days.",
        600,
        "guess_daily_words_30",
    ),
    (
        "Guess Daily Words for 90 Days in a Row",
        "Guess the daily word correctly for 90 consecutive days.",
        1200,
        "guess_daily_words_90",
    ),
    (
        "Guess Combo for 7 Days in a Row",
        "Guess a combo correctly for 7 consecutive days.",
        300,
        "guess_combo_7",
    ),
    (
        "Guess Combo for 30 Days in a Row",
        "Guess a combo correctly for 30 consecutive days.",
        700,
        "guess_combo_30",
    ),
    (
        "Guess Combo for 90 Days in a Row",
        "Guess a combo correctly for 90 consecutive days.",
        1500,
        "guess_combo_90",
    ),
    (
        "Guess Combo for 120 Days in a Row",
        "Guess a combo correctly for 120 consecutive days.",
        2000,
        "guess_combo_120",
    ),
    (
        "Connect TON Wallet",
        "Connect your TON wallet to the app.",
        500,
        "connect_ton_wallet",
    ),
];

/// Seed the stock catalog, skipping entries that already exist
pub async fn seed_default_tasks(pool: &SqlitePool) -> Result<u32> {
    let mut inserted = 0;
    for (name, description, reward, condition) in DEFAULT_TASKS {
        let image_link = format!("https://tapcoin.app/images/{condition}.png");
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO tasks (name, description, reward, condition, image_link, is_repeatable)
            VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(reward)
        .bind(condition)
        .bind(&image_link)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        inserted += result.rows_affected() as u32;
    }
    Ok(inserted)
}
