//! Database connection and initialization

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tapcoin_core::{Error, Result};

/// Database wrapper for SQLite operations
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to database at the given path, creating if necessary
    pub async fn connect(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::DatabaseError(e.to_string()))?;
        }

        let path_str = path.to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| Error::DatabaseError(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Connect to in-memory database (for testing)
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id TEXT NOT NULL,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                language_code TEXT,
                is_premium INTEGER NOT NULL DEFAULT 0,
                photo_url TEXT,
                balance INTEGER NOT NULL DEFAULT 0,
                referral_code TEXT NOT NULL,
                referred_by INTEGER,
                pending_referral_earnings INTEGER NOT NULL DEFAULT 0,
                total_referral_earnings INTEGER NOT NULL DEFAULT 0,
                last_referral_claim_date TIMESTAMP,
                check_in_streak INTEGER NOT NULL DEFAULT 0,
                last_check_in_date TIMESTAMP,
                last_check_in_claim_date TIMESTAMP,
                open_app_streak INTEGER NOT NULL DEFAULT 0,
                last_open_date TIMESTAMP,
                guess_word_dates TEXT NOT NULL DEFAULT '[]',
                guess_combo_dates TEXT NOT NULL DEFAULT '[]',
                roulette_config TEXT,
                last_combo_reward_date TIMESTAMP,
                last_daily_word_reward_date TIMESTAMP,
                cooldown_start TIMESTAMP,
                session_count INTEGER NOT NULL DEFAULT 0,
                ton_wallet_address TEXT,
                created_at TIMESTAMP NOT NULL,
                last_login TIMESTAMP,
                version INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (referred_by) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                reason TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                reward INTEGER NOT NULL,
                condition TEXT NOT NULL,
                image_link TEXT NOT NULL,
                is_repeatable INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS user_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                task_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'not_started',
                progress TEXT NOT NULL DEFAULT '{}',
                rewards_claimed INTEGER NOT NULL DEFAULT 0,
                completed_at TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (task_id) REFERENCES tasks(id)
            );

            CREATE TABLE IF NOT EXISTS referrals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                referrer_id INTEGER NOT NULL,
                referee_id INTEGER NOT NULL,
                total_earnings_from_referee INTEGER NOT NULL DEFAULT 0,
                earnings_since_last_claim INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (referrer_id) REFERENCES users(id),
                FOREIGN KEY (referee_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS combos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                correct_combination TEXT NOT NULL,
                reward INTEGER NOT NULL,
                date TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                word TEXT NOT NULL,
                reward INTEGER NOT NULL,
                date TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deferred_verifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                task_id INTEGER NOT NULL,
                run_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (task_id) REFERENCES tasks(id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        // Uniqueness invariants (idempotent): one account per Telegram
        // identity, one referral edge per referee, one progress row per
        // (user, task) pair.
        let _ = sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_telegram_id ON users (telegram_id)",
        )
        .execute(&self.pool)
        .await;

        let _ = sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_referral_code ON users (referral_code)",
        )
        .execute(&self.pool)
        .await;

        let _ = sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_tasks_user_task
             ON user_tasks (user_id, task_id)",
        )
        .execute(&self.pool)
        .await;

        let _ = sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_referrals_referee ON referrals (referee_id)",
        )
        .execute(&self.pool)
        .await;

        let _ = sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_deferred_run_at
             ON deferred_verifications (run_at)",
        )
        .execute(&self.pool)
        .await;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
