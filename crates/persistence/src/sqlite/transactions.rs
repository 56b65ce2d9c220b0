//! Audit-log access. The log is append-only: rows come from
//! `credit_balance`, task completion, or the referral accrual record,
//! and are never updated or deleted.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result, Transaction};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    user_id: i64,
    amount: i64,
    reason: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            reason: row.reason,
            date: row.created_at,
        }
    }
}

/// Append an audit record outside a balance mutation. Used for the
/// referral-bonus accrual, which lands on the pending pot rather than
/// the balance but still shows in the user's history.
pub async fn insert_transaction(
    pool: &SqlitePool,
    user_id: i64,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO transactions (user_id, amount, reason, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(amount)
        .bind(reason)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Get a user's transactions, newest first
pub async fn get_transactions(
    pool: &SqlitePool,
    user_id: i64,
    limit: u32,
    offset: u32,
) -> Result<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, amount, reason, created_at
        FROM transactions
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Transaction::from).collect())
}

/// Get transaction count for a user
pub async fn count_transactions(pool: &SqlitePool, user_id: i64) -> Result<u32> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0 as u32)
}
