//! Tapping sessions: five qualifying sessions per cycle, each paying a
//! flat reward, then a 20-hour cooldown before the cycle resets.

use crate::{ledger, referral, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result};
use tapcoin_persistence::sqlite;
use tracing::info;

/// Taps a session must reach to count
pub const MIN_TAPS_PER_SESSION: i64 = 60;

/// Qualifying sessions allowed before the cooldown starts
pub const SESSIONS_PER_CYCLE: i64 = 5;

/// Cooldown after a full cycle
pub const COOLDOWN_SECS: i64 = 20 * 3600;

/// Flat reward per qualifying session
pub const SESSION_REWARD: i64 = 100;

/// Result of reporting a tapping session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionOutcome {
    /// Fewer taps than the threshold; nothing recorded
    BelowThreshold,
    /// The cycle is spent; try again when the cooldown ends
    CoolingDown { seconds_remaining: i64 },
    Rewarded {
        reward: i64,
        sessions_used: i64,
        /// True when this session was the last of the cycle
        cycle_complete: bool,
        balance: i64,
    },
}

/// Report a finished tapping session
pub async fn record_session(
    pool: &SqlitePool,
    user_id: i64,
    taps: i64,
    now: DateTime<Utc>,
) -> Result<SessionOutcome> {
    if taps < MIN_TAPS_PER_SESSION {
        return Ok(SessionOutcome::BelowThreshold);
    }

    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        if let Some(start) = user.cooldown_start {
            let elapsed = (now - start).num_seconds();
            if elapsed < COOLDOWN_SECS {
                return Ok(SessionOutcome::CoolingDown {
                    seconds_remaining: COOLDOWN_SECS - elapsed,
                });
            }
            user.cooldown_start = None;
            user.session_count = 0;
        }

        user.session_count += 1;
        let cycle_complete = user.session_count >= SESSIONS_PER_CYCLE;
        if cycle_complete {
            user.cooldown_start = Some(now);
        }
        let sessions_used = user.session_count;

        if let Some(updated) =
            ledger::credit_and_update(pool, &user, SESSION_REWARD, "Tapping Session Reward", now)
                .await?
        {
            referral::propagate(pool, user_id, SESSION_REWARD, now).await?;
            info!(user_id, taps, sessions_used, cycle_complete, "tapping session recorded");
            return Ok(SessionOutcome::Rewarded {
                reward: SESSION_REWARD,
                sessions_used,
                cycle_complete,
                balance: updated.balance,
            });
        }
    }

    Err(Error::ConcurrentUpdate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::testutil::{at_day, seeded_db, test_user};
    use tapcoin_persistence::sqlite;

    #[tokio::test]
    async fn test_short_session_not_counted() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "730").await;

        let outcome = record_session(db.pool(), user.id, 59, at_day(100)).await.unwrap();
        assert_eq!(outcome, SessionOutcome::BelowThreshold);

        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, 0);
        assert_eq!(reloaded.session_count, 0);
    }

    #[tokio::test]
    async fn test_cycle_pays_five_sessions_then_cools_down() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "730").await;
        let now = at_day(100);

        for session in 1..=5 {
            let outcome = record_session(db.pool(), user.id, 80, now).await.unwrap();
            match outcome {
                SessionOutcome::Rewarded { reward, sessions_used, cycle_complete, .. } => {
                    assert_eq!(reward, 100);
                    assert_eq!(sessions_used, session);
                    assert_eq!(cycle_complete, session == 5);
                }
                other => panic!("expected reward, got {other:?}"),
            }
        }

        let outcome = record_session(db.pool(), user.id, 80, now).await.unwrap();
        assert_eq!(outcome, SessionOutcome::CoolingDown { seconds_remaining: COOLDOWN_SECS });

        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, 500);
    }

    #[tokio::test]
    async fn test_cooldown_expiry_resets_the_cycle() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "730").await;
        let now = at_day(100);

        for _ in 0..5 {
            record_session(db.pool(), user.id, 80, now).await.unwrap();
        }

        // One second before the cooldown ends: still locked
        let almost = now + Duration::seconds(COOLDOWN_SECS - 1);
        let outcome = record_session(db.pool(), user.id, 80, almost).await.unwrap();
        assert_eq!(outcome, SessionOutcome::CoolingDown { seconds_remaining: 1 });

        // At expiry the counter starts over
        let after = now + Duration::seconds(COOLDOWN_SECS);
        let outcome = record_session(db.pool(), user.id, 80, after).await.unwrap();
        match outcome {
            SessionOutcome::Rewarded { sessions_used, cycle_complete, .. } => {
                assert_eq!(sessions_used, 1);
                assert!(!cycle_complete);
            }
            other => panic!("expected reward, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_reward_accrues_referrer_share() {
        let db = seeded_db().await;
        let referrer = test_user(db.pool(), "731").await;
        let tapper = test_user(db.pool(), "732").await;
        sqlite::create_referral(db.pool(), referrer.id, tapper.id).await.unwrap();

        record_session(db.pool(), tapper.id, 80, at_day(100)).await.unwrap();

        let reloaded = sqlite::get_user(db.pool(), referrer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.pending_referral_earnings, 20);
    }
}
