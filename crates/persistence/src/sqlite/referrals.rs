//! Referral edge persistence

use sqlx::SqlitePool;
use tapcoin_core::{Error, Referral, ReferralFriend, Result};

#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    id: i64,
    referrer_id: i64,
    referee_id: i64,
    total_earnings_from_referee: i64,
    earnings_since_last_claim: i64,
}

impl From<ReferralRow> for Referral {
    fn from(row: ReferralRow) -> Self {
        Referral {
            id: row.id,
            referrer_id: row.referrer_id,
            referee_id: row.referee_id,
            total_earnings_from_referee: row.total_earnings_from_referee,
            earnings_since_last_claim: row.earnings_since_last_claim,
        }
    }
}

const REFERRAL_COLUMNS: &str =
    "id, referrer_id, referee_id, total_earnings_from_referee, earnings_since_last_claim";

/// Create the referrer -> referee edge. The unique referee index makes a
/// second registration attempt a no-op; self-referral is rejected here as
/// the last line of defense.
pub async fn create_referral(
    pool: &SqlitePool,
    referrer_id: i64,
    referee_id: i64,
) -> Result<bool> {
    if referrer_id == referee_id {
        return Err(Error::InvalidInput("self-referral is not allowed".into()));
    }

    let result = sqlx::query(
        "INSERT OR IGNORE INTO referrals (referrer_id, referee_id) VALUES (?, ?)",
    )
    .bind(referrer_id)
    .bind(referee_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// The edge pointing at a referee, if they were referred
pub async fn get_referral_by_referee(
    pool: &SqlitePool,
    referee_id: i64,
) -> Result<Option<Referral>> {
    let query = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referee_id = ?");
    let row: Option<ReferralRow> = sqlx::query_as(&query)
        .bind(referee_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Referral::from))
}

/// All edges owned by a referrer
pub async fn list_referrals_by_referrer(
    pool: &SqlitePool,
    referrer_id: i64,
) -> Result<Vec<Referral>> {
    let query = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referrer_id = ?");
    let rows: Vec<ReferralRow> = sqlx::query_as(&query)
        .bind(referrer_id)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Referral::from).collect())
}

/// Accrue a bonus on the edge's lifetime and since-last-claim counters
pub async fn add_edge_earnings(pool: &SqlitePool, referral_id: i64, bonus: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE referrals SET
            total_earnings_from_referee = total_earnings_from_referee + ?,
            earnings_since_last_claim = earnings_since_last_claim + ?
        WHERE id = ?
        "#,
    )
    .bind(bonus)
    .bind(bonus)
    .bind(referral_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Referees with a positive balance count as active
pub async fn count_active_referrals(pool: &SqlitePool, referrer_id: i64) -> Result<u32> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM referrals r
        JOIN users u ON u.id = r.referee_id
        WHERE r.referrer_id = ? AND u.balance > 0
        "#,
    )
    .bind(referrer_id)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0 as u32)
}

/// Referees flagged premium on their Telegram account
pub async fn count_premium_referrals(pool: &SqlitePool, referrer_id: i64) -> Result<u32> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM referrals r
        JOIN users u ON u.id = r.referee_id
        WHERE r.referrer_id = ? AND u.is_premium = 1
        "#,
    )
    .bind(referrer_id)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0 as u32)
}

/// Friends list for the referral summary: each referee with the lifetime
/// earnings they brought in
pub async fn list_referral_friends(
    pool: &SqlitePool,
    referrer_id: i64,
) -> Result<Vec<ReferralFriend>> {
    let rows: Vec<(i64, Option<String>, Option<String>, Option<String>, Option<String>, i64)> =
        sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.first_name, u.last_name, u.photo_url,
                   r.total_earnings_from_referee
            FROM referrals r
            JOIN users u ON u.id = r.referee_id
            WHERE r.referrer_id = ?
            ORDER BY r.total_earnings_from_referee DESC
            "#,
        )
        .bind(referrer_id)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows
        .into_iter()
        .map(
            |(user_id, username, first_name, last_name, photo_url, earnings)| ReferralFriend {
                user_id,
                username: username.unwrap_or_default(),
                first_name: first_name.unwrap_or_default(),
                last_name: last_name.unwrap_or_default(),
                photo_url: photo_url.unwrap_or_default(),
                total_earnings_from_referee: earnings,
            },
        )
        .collect())
}
