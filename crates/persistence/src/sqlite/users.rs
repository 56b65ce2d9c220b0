//! User persistence: row mapping, guarded writes and the atomic
//! balance mutation backing the ledger

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tapcoin_core::{
    DailyCheckIn, Error, OpenAppStreak, Result, RouletteConfig, TelegramProfile, User,
};

/// Raw users row; JSON columns are decoded in `into_user`
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    telegram_id: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    language_code: Option<String>,
    is_premium: bool,
    photo_url: Option<String>,
    balance: i64,
    referral_code: String,
    referred_by: Option<i64>,
    pending_referral_earnings: i64,
    total_referral_earnings: i64,
    last_referral_claim_date: Option<DateTime<Utc>>,
    check_in_streak: i64,
    last_check_in_date: Option<DateTime<Utc>>,
    last_check_in_claim_date: Option<DateTime<Utc>>,
    open_app_streak: i64,
    last_open_date: Option<DateTime<Utc>>,
    guess_word_dates: String,
    guess_combo_dates: String,
    roulette_config: Option<String>,
    last_combo_reward_date: Option<DateTime<Utc>>,
    last_daily_word_reward_date: Option<DateTime<Utc>>,
    cooldown_start: Option<DateTime<Utc>>,
    session_count: i64,
    ton_wallet_address: Option<String>,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    version: i64,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let guess_word_dates: Vec<DateTime<Utc>> = serde_json::from_str(&self.guess_word_dates)
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
        let guess_combo_dates: Vec<DateTime<Utc>> = serde_json::from_str(&self.guess_combo_dates)
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
        let roulette_config: Option<RouletteConfig> = match self.roulette_config {
            Some(raw) => {
                Some(serde_json::from_str(&raw).map_err(|e| Error::DatabaseError(e.to_string()))?)
            }
            None => None,
        };

        Ok(User {
            id: self.id,
            telegram_id: self.telegram_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            language_code: self.language_code,
            is_premium: self.is_premium,
            photo_url: self.photo_url,
            balance: self.balance,
            referral_code: self.referral_code,
            referred_by: self.referred_by,
            pending_referral_earnings: self.pending_referral_earnings,
            total_referral_earnings: self.total_referral_earnings,
            last_referral_claim_date: self.last_referral_claim_date,
            daily_check_in: DailyCheckIn {
                streak: self.check_in_streak,
                last_check_in_date: self.last_check_in_date,
                last_claim_date: self.last_check_in_claim_date,
            },
            open_app_streak: OpenAppStreak {
                streak: self.open_app_streak,
                last_open_date: self.last_open_date,
            },
            guess_word_dates,
            guess_combo_dates,
            roulette_config,
            last_combo_reward_date: self.last_combo_reward_date,
            last_daily_word_reward_date: self.last_daily_word_reward_date,
            cooldown_start: self.cooldown_start,
            session_count: self.session_count,
            ton_wallet_address: self.ton_wallet_address,
            created_at: self.created_at,
            last_login: self.last_login,
            version: self.version,
        })
    }
}

const USER_COLUMNS: &str = r#"
    id, telegram_id, username, first_name, last_name, language_code, is_premium,
    photo_url, balance, referral_code, referred_by, pending_referral_earnings,
    total_referral_earnings, last_referral_claim_date, check_in_streak,
    last_check_in_date, last_check_in_claim_date, open_app_streak, last_open_date,
    guess_word_dates, guess_combo_dates, roulette_config, last_combo_reward_date,
    last_daily_word_reward_date, cooldown_start, session_count, ton_wallet_address,
    created_at, last_login, version
"#;

/// Create a new user from an authenticated Telegram profile
pub async fn create_user(
    pool: &SqlitePool,
    profile: &TelegramProfile,
    referral_code: &str,
    referred_by: Option<i64>,
    now: DateTime<Utc>,
) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (
            telegram_id, username, first_name, last_name, language_code,
            is_premium, photo_url, referral_code, referred_by, created_at, last_login
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&profile.telegram_id)
    .bind(&profile.username)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.language_code)
    .bind(profile.is_premium)
    .bind(&profile.photo_url)
    .bind(referral_code)
    .bind(referred_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let id = result.last_insert_rowid();
    get_user(pool, id)
        .await?
        .ok_or(Error::UserNotFound(id))
}

async fn fetch_user(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let row: Option<UserRow> = sqlx::query_as(&query)
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(UserRow::into_user).transpose()
}

/// Fetch a user by internal id
pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    fetch_user(&mut conn, user_id).await
}

/// Fetch a user by their stable Telegram identity
pub async fn get_user_by_telegram_id(
    pool: &SqlitePool,
    telegram_id: &str,
) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?");
    let row: Option<UserRow> = sqlx::query_as(&query)
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(UserRow::into_user).transpose()
}

/// Fetch a user by their referral code (registration-time lookup)
pub async fn get_user_by_referral_code(pool: &SqlitePool, code: &str) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = ?");
    let row: Option<UserRow> = sqlx::query_as(&query)
        .bind(code)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(UserRow::into_user).transpose()
}

async fn apply_user_update(conn: &mut SqliteConnection, user: &User) -> Result<bool> {
    let guess_word_dates = serde_json::to_string(&user.guess_word_dates)
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    let guess_combo_dates = serde_json::to_string(&user.guess_combo_dates)
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    let roulette_config = match &user.roulette_config {
        Some(config) => Some(
            serde_json::to_string(config).map_err(|e| Error::DatabaseError(e.to_string()))?,
        ),
        None => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE users SET
            username = ?, first_name = ?, last_name = ?, language_code = ?,
            is_premium = ?, photo_url = ?,
            check_in_streak = ?, last_check_in_date = ?, last_check_in_claim_date = ?,
            open_app_streak = ?, last_open_date = ?,
            guess_word_dates = ?, guess_combo_dates = ?, roulette_config = ?,
            last_combo_reward_date = ?, last_daily_word_reward_date = ?,
            cooldown_start = ?, session_count = ?, ton_wallet_address = ?,
            last_referral_claim_date = ?, last_login = ?,
            version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.language_code)
    .bind(user.is_premium)
    .bind(&user.photo_url)
    .bind(user.daily_check_in.streak)
    .bind(user.daily_check_in.last_check_in_date)
    .bind(user.daily_check_in.last_claim_date)
    .bind(user.open_app_streak.streak)
    .bind(user.open_app_streak.last_open_date)
    .bind(&guess_word_dates)
    .bind(&guess_combo_dates)
    .bind(&roulette_config)
    .bind(user.last_combo_reward_date)
    .bind(user.last_daily_word_reward_date)
    .bind(user.cooldown_start)
    .bind(user.session_count)
    .bind(&user.ton_wallet_address)
    .bind(user.last_referral_claim_date)
    .bind(user.last_login)
    .bind(user.id)
    .bind(user.version)
    .execute(conn)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Version-guarded write of all mutable user state. Returns false when
/// another writer got there first; callers reload and retry.
///
/// `balance` and the referral earning counters are deliberately NOT
/// written here: they are only mutated by their own atomic updates.
pub async fn update_user(pool: &SqlitePool, user: &User) -> Result<bool> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    apply_user_update(&mut conn, user).await
}

/// Version-guarded user write plus balance credit plus audit append, all
/// in one SQL transaction. Daily-gate flows go through this so a gating
/// stamp can never be committed without its reward (or vice versa).
/// Returns `None` when the version guard lost; nothing is written then.
pub async fn update_user_and_credit(
    pool: &SqlitePool,
    user: &User,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if !apply_user_update(&mut *tx, user).await? {
        return Ok(None);
    }

    let credited = sqlx::query(
        "UPDATE users SET balance = balance + ? WHERE id = ? AND balance + ? >= 0",
    )
    .bind(amount)
    .bind(user.id)
    .bind(amount)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if credited.rows_affected() == 0 {
        return Err(Error::InsufficientBalance {
            required: -amount,
            available: user.balance,
        });
    }

    sqlx::query("INSERT INTO transactions (user_id, amount, reason, created_at) VALUES (?, ?, ?, ?)")
        .bind(user.id)
        .bind(amount)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let updated = fetch_user(&mut *tx, user.id)
        .await?
        .ok_or(Error::UserNotFound(user.id))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(Some(updated))
}

/// Atomic balance mutation plus audit append, in one SQL transaction.
/// A debit that would take the balance negative changes nothing and
/// fails with `InsufficientBalance`.
pub async fn credit_balance(
    pool: &SqlitePool,
    user_id: i64,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<User> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let updated = sqlx::query(
        "UPDATE users SET balance = balance + ? WHERE id = ? AND balance + ? >= 0",
    )
    .bind(amount)
    .bind(user_id)
    .bind(amount)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if updated.rows_affected() == 0 {
        let row: Option<(i64,)> = sqlx::query_as("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        return match row {
            None => Err(Error::UserNotFound(user_id)),
            Some((available,)) => Err(Error::InsufficientBalance {
                required: -amount,
                available,
            }),
        };
    }

    sqlx::query("INSERT INTO transactions (user_id, amount, reason, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(amount)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    get_user(pool, user_id)
        .await?
        .ok_or(Error::UserNotFound(user_id))
}

/// Accrue a referral bonus on the referrer's pending/total counters.
/// Single-statement update, so concurrent propagations never lose increments.
pub async fn add_referral_earnings(
    pool: &SqlitePool,
    referrer_id: i64,
    bonus: i64,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            pending_referral_earnings = pending_referral_earnings + ?,
            total_referral_earnings = total_referral_earnings + ?
        WHERE id = ?
        "#,
    )
    .bind(bonus)
    .bind(bonus)
    .bind(referrer_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(Error::UserNotFound(referrer_id));
    }
    Ok(())
}

/// Settle a referral claim in one SQL transaction: move the pending
/// earnings onto the balance, stamp the claim date, zero every owned
/// edge's since-last-claim counter and append the audit record. Guarded
/// on the pending amount still being what the caller read, so a
/// concurrent claim or propagation settles nothing; returns `None` then.
pub async fn settle_referral_claim(
    pool: &SqlitePool,
    user_id: i64,
    expected_pending: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let settled = sqlx::query(
        r#"
        UPDATE users SET
            balance = balance + pending_referral_earnings,
            pending_referral_earnings = 0,
            last_referral_claim_date = ?,
            version = version + 1
        WHERE id = ? AND pending_referral_earnings = ?
        "#,
    )
    .bind(now)
    .bind(user_id)
    .bind(expected_pending)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if settled.rows_affected() == 0 {
        return Ok(None);
    }

    sqlx::query("UPDATE referrals SET earnings_since_last_claim = 0 WHERE referrer_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    sqlx::query("INSERT INTO transactions (user_id, amount, reason, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(expected_pending)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let updated = fetch_user(&mut *tx, user_id)
        .await?
        .ok_or(Error::UserNotFound(user_id))?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(Some(updated))
}
