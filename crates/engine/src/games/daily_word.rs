//! Daily-word guessing. Same daily gate as the combo game, but there is
//! no fallback word: a day without a scheduled word has nothing to guess.

use crate::window;
use crate::{ledger, referral, streak, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tapcoin_core::{DailyWord, Error, Result};
use tapcoin_persistence::sqlite;
use tracing::info;

const WORD_STREAK_MILESTONES: &[(u32, &str)] = &[
    (7, "guess_daily_words_7"),
    (30, "guess_daily_words_30"),
    (90, "guess_daily_words_90"),
];

/// Result of a daily-word guess
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GuessOutcome {
    Correct {
        reward: i64,
        balance: i64,
        streak: i64,
        streak_tasks: Vec<i64>,
        /// Countdown to the next playable word
        seconds_until_next: i64,
    },
    Incorrect,
}

/// Guess today's word
pub async fn guess(
    pool: &SqlitePool,
    user_id: i64,
    attempt: &str,
    now: DateTime<Utc>,
) -> Result<GuessOutcome> {
    let word = todays_word(pool, now).await?;

    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        if window::is_same_day(user.last_daily_word_reward_date, now) {
            return Err(Error::AlreadyClaimedToday);
        }
        if !attempt.trim().eq_ignore_ascii_case(word.word.trim()) {
            return Ok(GuessOutcome::Incorrect);
        }

        user.last_daily_word_reward_date = Some(now);
        user.guess_word_dates.push(now);
        let run = streak::consecutive_run_days(&user.guess_word_dates, now);

        if let Some(updated) =
            ledger::credit_and_update(pool, &user, word.reward, "Daily Word Reward", now).await?
        {
            referral::propagate(pool, user_id, word.reward, now).await?;
            let streak_tasks =
                streak::sweep_run_milestones(pool, user_id, run, WORD_STREAK_MILESTONES, now)
                    .await?;
            info!(user_id, reward = word.reward, streak = run, "daily word guessed");
            return Ok(GuessOutcome::Correct {
                reward: word.reward,
                balance: updated.balance,
                streak: run,
                streak_tasks,
                seconds_until_next: window::seconds_until_next_day(now),
            });
        }
    }

    Err(Error::ConcurrentUpdate)
}

async fn todays_word(pool: &SqlitePool, now: DateTime<Utc>) -> Result<DailyWord> {
    let (day_start, day_end) = window::day_bounds(now);
    sqlite::get_daily_word_for_day(pool, day_start, day_end)
        .await?
        .ok_or_else(|| Error::InvalidInput("no daily word scheduled".into()))
}
