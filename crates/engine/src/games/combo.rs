//! Combo guessing: one ordered combination per day, one payout per day.
//! Correct guesses feed the combo date log, which drives the guess-streak
//! milestone tasks.

use crate::window;
use crate::{ledger, referral, streak, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tapcoin_core::{Combo, Error, Result};
use tapcoin_persistence::sqlite;
use tracing::info;

const COMBO_STREAK_MILESTONES: &[(u32, &str)] = &[
    (7, "guess_combo_7"),
    (30, "guess_combo_30"),
    (90, "guess_combo_90"),
    (120, "guess_combo_120"),
];

/// Result of a combo guess
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GuessOutcome {
    Correct {
        reward: i64,
        balance: i64,
        streak: i64,
        /// Guess-streak milestone tasks credited by this guess
        streak_tasks: Vec<i64>,
        /// Countdown to the next playable combo
        seconds_until_next: i64,
    },
    /// Wrong guesses change nothing; the user may try again today
    Incorrect,
}

/// Guess today's combo. Falls back to the most recently scheduled combo
/// when none is set for today, so a scheduling gap never blanks the game.
pub async fn guess(
    pool: &SqlitePool,
    user_id: i64,
    attempt: &[String],
    now: DateTime<Utc>,
) -> Result<GuessOutcome> {
    let combo = active_combo(pool, now).await?;

    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        if window::is_same_day(user.last_combo_reward_date, now) {
            return Err(Error::AlreadyClaimedToday);
        }
        if !matches_combination(attempt, &combo.correct_combination) {
            return Ok(GuessOutcome::Incorrect);
        }

        user.last_combo_reward_date = Some(now);
        user.guess_combo_dates.push(now);
        let run = streak::consecutive_run_days(&user.guess_combo_dates, now);

        if let Some(updated) =
            ledger::credit_and_update(pool, &user, combo.reward, "Combo Reward", now).await?
        {
            referral::propagate(pool, user_id, combo.reward, now).await?;
            let streak_tasks =
                streak::sweep_run_milestones(pool, user_id, run, COMBO_STREAK_MILESTONES, now)
                    .await?;
            info!(user_id, reward = combo.reward, streak = run, "combo guessed");
            return Ok(GuessOutcome::Correct {
                reward: combo.reward,
                balance: updated.balance,
                streak: run,
                streak_tasks,
                seconds_until_next: window::seconds_until_next_day(now),
            });
        }
    }

    Err(Error::ConcurrentUpdate)
}

async fn active_combo(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Combo> {
    let (day_start, day_end) = window::day_bounds(now);
    if let Some(combo) = sqlite::get_combo_for_day(pool, day_start, day_end).await? {
        return Ok(combo);
    }
    sqlite::get_latest_combo(pool)
        .await?
        .ok_or_else(|| Error::InvalidInput("no combo scheduled".into()))
}

// The combo is matched exactly, element for element. Only the word game
// is lenient about case and whitespace.
fn matches_combination(attempt: &[String], correct: &[String]) -> bool {
    attempt == correct
}
