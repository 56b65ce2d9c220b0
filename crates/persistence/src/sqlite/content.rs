//! Daily puzzle content: combos and daily words. One active entry per
//! calendar day, admin-managed.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tapcoin_core::{Combo, DailyWord, Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct ComboRow {
    id: i64,
    correct_combination: String,
    reward: i64,
    date: DateTime<Utc>,
}

impl ComboRow {
    fn into_combo(self) -> Result<Combo> {
        Ok(Combo {
            id: self.id,
            correct_combination: serde_json::from_str(&self.correct_combination)
                .map_err(|e| Error::DatabaseError(e.to_string()))?,
            reward: self.reward,
            date: self.date,
        })
    }
}

/// The combo scheduled inside [day_start, day_end)
pub async fn get_combo_for_day(
    pool: &SqlitePool,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
) -> Result<Option<Combo>> {
    let row: Option<ComboRow> = sqlx::query_as(
        "SELECT id, correct_combination, reward, date FROM combos WHERE date >= ? AND date < ?",
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(ComboRow::into_combo).transpose()
}

/// Most recently scheduled combo, used as a fallback when today's is unset
pub async fn get_latest_combo(pool: &SqlitePool) -> Result<Option<Combo>> {
    let row: Option<ComboRow> = sqlx::query_as(
        "SELECT id, correct_combination, reward, date FROM combos ORDER BY date DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(ComboRow::into_combo).transpose()
}

/// Schedule a combo (admin path)
pub async fn insert_combo(
    pool: &SqlitePool,
    combination: &[String],
    reward: i64,
    date: DateTime<Utc>,
) -> Result<i64> {
    let combination_json =
        serde_json::to_string(combination).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let result = sqlx::query(
        "INSERT INTO combos (correct_combination, reward, date) VALUES (?, ?, ?)",
    )
    .bind(&combination_json)
    .bind(reward)
    .bind(date)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

#[derive(Debug, sqlx::FromRow)]
struct DailyWordRow {
    id: i64,
    word: String,
    reward: i64,
    date: DateTime<Utc>,
}

/// The daily word scheduled inside [day_start, day_end). No fallback:
/// without a word for today there is nothing to guess.
pub async fn get_daily_word_for_day(
    pool: &SqlitePool,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
) -> Result<Option<DailyWord>> {
    let row: Option<DailyWordRow> = sqlx::query_as(
        "SELECT id, word, reward, date FROM daily_words WHERE date >= ? AND date < ?",
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(|r| DailyWord {
        id: r.id,
        word: r.word,
        reward: r.reward,
        date: r.date,
    }))
}

/// Schedule a daily word (admin path)
pub async fn insert_daily_word(
    pool: &SqlitePool,
    word: &str,
    reward: i64,
    date: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO daily_words (word, reward, date) VALUES (?, ?, ?)")
        .bind(word)
        .bind(reward)
        .bind(date)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}
