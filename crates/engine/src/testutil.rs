//! Shared helpers for engine tests: in-memory databases, canned users
//! and a scriptable membership checker

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU32, Ordering};
use tapcoin_core::{Error, Result, TelegramProfile, User};
use tapcoin_networking::MembershipCheck;
use tapcoin_persistence::{sqlite, Database};

pub async fn test_db() -> Database {
    Database::connect_in_memory().await.unwrap()
}

/// In-memory database with the stock task catalog seeded
pub async fn seeded_db() -> Database {
    let db = test_db().await;
    sqlite::seed_default_tasks(db.pool()).await.unwrap();
    db
}

/// Midday of the given UTC day index, so same-day comparisons have room
/// on both sides
pub fn at_day(day: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(day * 86_400 + 43_200, 0).unwrap()
}

pub fn profile(telegram_id: &str) -> TelegramProfile {
    TelegramProfile {
        telegram_id: telegram_id.to_string(),
        username: Some(format!("user{telegram_id}")),
        first_name: None,
        last_name: None,
        language_code: None,
        is_premium: false,
        photo_url: None,
    }
}

pub async fn test_user(pool: &SqlitePool, telegram_id: &str) -> User {
    let code = format!("CODE{telegram_id}");
    sqlite::create_user(pool, &profile(telegram_id), &code, None, at_day(99))
        .await
        .unwrap()
}

/// Membership checker with a fixed answer; counts how often it is asked
pub struct StubMembership {
    pub member: bool,
    pub fail: bool,
    pub calls: AtomicU32,
}

impl StubMembership {
    pub fn member() -> Self {
        Self { member: true, fail: false, calls: AtomicU32::new(0) }
    }

    pub fn not_member() -> Self {
        Self { member: false, fail: false, calls: AtomicU32::new(0) }
    }

    pub fn failing() -> Self {
        Self { member: false, fail: true, calls: AtomicU32::new(0) }
    }
}

impl MembershipCheck for StubMembership {
    async fn is_member(&self, _telegram_id: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::ExternalCheckFailed("stubbed outage".into()));
        }
        Ok(self.member)
    }
}
