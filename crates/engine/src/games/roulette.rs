//! Daily roulette. A fresh wheel is generated per user per day with the
//! winning slot committed at generation time, so the payout is fixed
//! before the user ever spins.

use crate::window;
use crate::{ledger, referral, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result, RouletteConfig};
use tapcoin_persistence::sqlite;
use tracing::info;

const WHEEL_SLOTS: usize = 10;
const SLOT_STEP: i64 = 100;

/// Result of a spin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResult {
    pub reward: i64,
    pub index: usize,
    pub balance: i64,
}

/// Today's wheel for a user, generating and persisting one if needed.
/// The same wheel comes back for the rest of the day.
pub async fn wheel(pool: &SqlitePool, user_id: i64, now: DateTime<Utc>) -> Result<RouletteConfig> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        if let Some(config) = current_config(&user.roulette_config, now) {
            return Ok(config);
        }

        let config = fresh_config(now);
        user.roulette_config = Some(config.clone());
        if sqlite::update_user(pool, &user).await? {
            return Ok(config);
        }
    }

    Err(Error::ConcurrentUpdate)
}

/// Spin today's wheel. The reward was decided when the wheel was
/// generated; spinning reveals it, credits it and locks the wheel until
/// tomorrow.
pub async fn spin(pool: &SqlitePool, user_id: i64, now: DateTime<Utc>) -> Result<SpinResult> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        let mut config = match current_config(&user.roulette_config, now) {
            Some(config) => config,
            None => fresh_config(now),
        };
        if window::is_same_day(config.last_spin_date, now) {
            return Err(Error::AlreadyClaimedToday);
        }

        let index = config.selected_index;
        let reward = config
            .rewards
            .get(index)
            .copied()
            .ok_or_else(|| Error::DatabaseError("roulette winning index out of range".into()))?;
        config.last_spin_date = Some(now);
        user.roulette_config = Some(config);

        if let Some(updated) =
            ledger::credit_and_update(pool, &user, reward, "Roulette Reward", now).await?
        {
            referral::propagate(pool, user_id, reward, now).await?;
            info!(user_id, reward, index, "roulette spun");
            return Ok(SpinResult { reward, index, balance: updated.balance });
        }
    }

    Err(Error::ConcurrentUpdate)
}

fn current_config(config: &Option<RouletteConfig>, now: DateTime<Utc>) -> Option<RouletteConfig> {
    config
        .as_ref()
        .filter(|c| window::is_same_day(Some(c.date_created), now))
        .cloned()
}

fn fresh_config(now: DateTime<Utc>) -> RouletteConfig {
    let mut rng = rand::thread_rng();
    let mut rewards: Vec<i64> = (1..=WHEEL_SLOTS as i64).map(|i| i * SLOT_STEP).collect();
    rewards.shuffle(&mut rng);
    RouletteConfig {
        rewards,
        selected_index: rng.gen_range(0..WHEEL_SLOTS),
        date_created: now,
        last_spin_date: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at_day, seeded_db, test_user};
    use tapcoin_persistence::sqlite;

    #[tokio::test]
    async fn test_wheel_holds_a_permutation_of_the_slot_values() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "720").await;

        let config = wheel(db.pool(), user.id, at_day(100)).await.unwrap();
        assert!(config.selected_index < WHEEL_SLOTS);
        let mut sorted = config.rewards.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=10).map(|i| i * 100).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_wheel_is_stable_within_the_day() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "720").await;

        let first = wheel(db.pool(), user.id, at_day(100)).await.unwrap();
        let second = wheel(db.pool(), user.id, at_day(100)).await.unwrap();
        assert_eq!(first.rewards, second.rewards);
        assert_eq!(first.selected_index, second.selected_index);
    }

    #[tokio::test]
    async fn test_spin_pays_the_predetermined_slot() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "720").await;

        let config = wheel(db.pool(), user.id, at_day(100)).await.unwrap();
        let expected = config.rewards[config.selected_index];

        let result = spin(db.pool(), user.id, at_day(100)).await.unwrap();
        assert_eq!(result.reward, expected);
        assert_eq!(result.index, config.selected_index);
        assert_eq!(result.balance, expected);
    }

    #[tokio::test]
    async fn test_one_spin_per_day() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "720").await;

        spin(db.pool(), user.id, at_day(100)).await.unwrap();
        let err = spin(db.pool(), user.id, at_day(100)).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyClaimedToday));

        // A new day brings a new wheel and a new spin
        let result = spin(db.pool(), user.id, at_day(101)).await.unwrap();
        assert!(result.reward >= 100 && result.reward <= 1000);
        assert_eq!(result.reward % 100, 0);
    }

    #[tokio::test]
    async fn test_corrupt_winning_index_is_an_error_not_a_panic() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "720").await;

        wheel(db.pool(), user.id, at_day(100)).await.unwrap();
        let mut user = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        let mut config = user.roulette_config.clone().unwrap();
        config.selected_index = 99;
        user.roulette_config = Some(config);
        assert!(sqlite::update_user(db.pool(), &user).await.unwrap());

        let err = spin(db.pool(), user.id, at_day(100)).await.unwrap_err();
        assert!(matches!(err, Error::DatabaseError(_)));

        // Nothing was stamped or paid
        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, 0);
        assert!(reloaded.roulette_config.unwrap().last_spin_date.is_none());
    }

    #[tokio::test]
    async fn test_spin_reward_lands_on_the_balance() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "720").await;

        let result = spin(db.pool(), user.id, at_day(100)).await.unwrap();
        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, result.reward);
        assert_eq!(sqlite::count_transactions(db.pool(), user.id).await.unwrap(), 1);
    }
}
