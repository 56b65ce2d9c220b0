//! Streak engine: the 7-day check-in cycle, the open-app streak fed by
//! logins, and streaks derived from the guess-date logs

use crate::window::{self, DayWindow};
use crate::{ledger, referral, task, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tapcoin_core::{DailyCheckIn, Error, OpenAppStreak, Result, User};
use tapcoin_persistence::sqlite;
use tracing::info;

/// Check-in reward per streak day: day 1 pays 100, day 7 pays 700
pub const CHECK_IN_REWARD_PER_DAY: i64 = 100;

/// Streak day at which the check-in cycle wraps back to 1
pub const CHECK_IN_CYCLE_DAYS: i64 = 7;

/// Open-app streak milestones with a matching catalog task
pub const OPEN_APP_MILESTONES: &[u32] = &[7, 30, 100];

/// Advance the check-in streak for a visit at `now`. Same-day visits are
/// a no-op; a consecutive day past the end of the 7-day cycle wraps the
/// streak back to 1.
pub fn advance_check_in(check_in: &mut DailyCheckIn, now: DateTime<Utc>) {
    match window::classify(check_in.last_check_in_date, now) {
        DayWindow::SameDay => {}
        DayWindow::Consecutive => {
            check_in.streak = if check_in.streak >= CHECK_IN_CYCLE_DAYS {
                1
            } else {
                check_in.streak + 1
            };
            check_in.last_check_in_date = Some(now);
        }
        DayWindow::Broken => {
            check_in.streak = 1;
            check_in.last_check_in_date = Some(now);
        }
    }
}

/// Advance the open-app streak for a visit at `now`. Unlike check-in
/// this counter never wraps; milestones read it directly.
pub fn advance_open_app(open_app: &mut OpenAppStreak, now: DateTime<Utc>) {
    match window::classify(open_app.last_open_date, now) {
        DayWindow::SameDay => {}
        DayWindow::Consecutive => {
            open_app.streak += 1;
            open_app.last_open_date = Some(now);
        }
        DayWindow::Broken => {
            open_app.streak = 1;
            open_app.last_open_date = Some(now);
        }
    }
}

/// Claim today's check-in reward: streak day times 100. Advances the
/// streak first if the login path has not already done so today, then
/// stamps the claim date so a second call the same day is rejected. The
/// stamp and the credit commit together; a failed claim leaves the day
/// claimable.
pub async fn claim_check_in(
    pool: &SqlitePool,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<(User, i64)> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        if window::is_same_day(user.daily_check_in.last_claim_date, now) {
            return Err(Error::AlreadyClaimedToday);
        }

        advance_check_in(&mut user.daily_check_in, now);
        user.daily_check_in.last_claim_date = Some(now);
        let reward = user.daily_check_in.streak * CHECK_IN_REWARD_PER_DAY;

        if let Some(updated) =
            ledger::credit_and_update(pool, &user, reward, "Daily Check-In Reward", now).await?
        {
            referral::propagate(pool, user_id, reward, now).await?;
            info!(user_id, streak = user.daily_check_in.streak, reward, "check-in claimed");
            return Ok((updated, reward));
        }
    }

    Err(Error::ConcurrentUpdate)
}

/// Credit every open-app milestone task the streak has reached. Already
/// completed milestones are skipped by the completion guard, so sweeping
/// on every login is safe.
pub async fn sweep_open_app_milestones(
    pool: &SqlitePool,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let mut credited = Vec::new();
    for &days in OPEN_APP_MILESTONES {
        if user.open_app_streak.streak >= days as i64 {
            let condition = format!("open_app_{days}_days");
            if let Some(task_id) = task::credit_condition(pool, user.id, &condition, now).await? {
                credited.push(task_id);
            }
        }
    }
    Ok(credited)
}

/// Length of the consecutive-day run ending at the most recent entry,
/// or 0 if that run does not reach today or yesterday. Derived fresh
/// from the date log on every call.
pub fn consecutive_run_days(dates: &[DateTime<Utc>], now: DateTime<Utc>) -> i64 {
    let mut days: Vec<i64> = dates.iter().map(|d| window::day_index(*d)).collect();
    days.sort_unstable();
    days.dedup();

    let Some(&latest) = days.last() else {
        return 0;
    };
    let today = window::day_index(now);
    if latest != today && latest != today - 1 {
        return 0;
    }

    let mut run = 1;
    let mut idx = days.len() - 1;
    while idx > 0 && days[idx - 1] == days[idx] - 1 {
        run += 1;
        idx -= 1;
    }
    run
}

/// Credit every guess-streak task whose threshold the current run has
/// reached. `conditions` pairs each threshold with its catalog condition.
pub(crate) async fn sweep_run_milestones(
    pool: &SqlitePool,
    user_id: i64,
    run: i64,
    conditions: &[(u32, &str)],
    now: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let mut credited = Vec::new();
    for &(threshold, condition) in conditions {
        if run >= threshold as i64 {
            if let Some(task_id) = task::credit_condition(pool, user_id, condition, now).await? {
                credited.push(task_id);
            }
        }
    }
    Ok(credited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at_day, seeded_db, test_user};
    use tapcoin_persistence::sqlite;

    #[test]
    fn test_check_in_wraps_after_seven_days() {
        let mut check_in = DailyCheckIn::default();
        let mut streaks = Vec::new();
        for day in 0..9 {
            advance_check_in(&mut check_in, at_day(100 + day));
            streaks.push(check_in.streak);
        }
        assert_eq!(streaks, vec![1, 2, 3, 4, 5, 6, 7, 1, 2]);
    }

    #[test]
    fn test_check_in_same_day_is_noop() {
        let mut check_in = DailyCheckIn::default();
        advance_check_in(&mut check_in, at_day(100));
        advance_check_in(&mut check_in, at_day(100));
        assert_eq!(check_in.streak, 1);
    }

    #[test]
    fn test_check_in_gap_resets() {
        let mut check_in = DailyCheckIn::default();
        advance_check_in(&mut check_in, at_day(100));
        advance_check_in(&mut check_in, at_day(101));
        advance_check_in(&mut check_in, at_day(105));
        assert_eq!(check_in.streak, 1);
    }

    #[test]
    fn test_open_app_streak_does_not_wrap() {
        let mut open_app = OpenAppStreak::default();
        for day in 0..10 {
            advance_open_app(&mut open_app, at_day(100 + day));
        }
        assert_eq!(open_app.streak, 10);
    }

    #[test]
    fn test_consecutive_run_counts_back_from_latest() {
        let dates = vec![at_day(97), at_day(98), at_day(99), at_day(100)];
        assert_eq!(consecutive_run_days(&dates, at_day(100)), 4);
    }

    #[test]
    fn test_consecutive_run_tolerates_yesterday_as_latest() {
        let dates = vec![at_day(98), at_day(99)];
        assert_eq!(consecutive_run_days(&dates, at_day(100)), 2);
    }

    #[test]
    fn test_consecutive_run_zero_when_stale() {
        let dates = vec![at_day(90), at_day(91)];
        assert_eq!(consecutive_run_days(&dates, at_day(100)), 0);
        assert_eq!(consecutive_run_days(&[], at_day(100)), 0);
    }

    #[test]
    fn test_consecutive_run_breaks_at_gap() {
        let dates = vec![at_day(95), at_day(98), at_day(99), at_day(100)];
        assert_eq!(consecutive_run_days(&dates, at_day(100)), 3);
    }

    #[test]
    fn test_consecutive_run_dedupes_same_day_entries() {
        let dates = vec![at_day(99), at_day(100), at_day(100)];
        assert_eq!(consecutive_run_days(&dates, at_day(100)), 2);
    }

    #[tokio::test]
    async fn test_claim_check_in_pays_streak_times_hundred() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "200").await;

        let (updated, reward) = claim_check_in(db.pool(), user.id, at_day(100)).await.unwrap();
        assert_eq!(reward, 100);
        assert_eq!(updated.balance, 100);

        let (updated, reward) = claim_check_in(db.pool(), user.id, at_day(101)).await.unwrap();
        assert_eq!(reward, 200);
        assert_eq!(updated.balance, 300);
    }

    #[tokio::test]
    async fn test_claim_check_in_rejects_second_claim_same_day() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "200").await;

        claim_check_in(db.pool(), user.id, at_day(100)).await.unwrap();
        let err = claim_check_in(db.pool(), user.id, at_day(100)).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyClaimedToday));

        // Even at the very end of the same UTC day
        let late = at_day(100) + chrono::Duration::hours(11);
        let err = claim_check_in(db.pool(), user.id, late).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyClaimedToday));
    }

    #[tokio::test]
    async fn test_claim_check_in_full_cycle_rewards() {
        let db = seeded_db().await;
        let user = test_user(db.pool(), "200").await;

        let mut rewards = Vec::new();
        for day in 0..8 {
            let (_, reward) = claim_check_in(db.pool(), user.id, at_day(100 + day)).await.unwrap();
            rewards.push(reward);
        }
        assert_eq!(rewards, vec![100, 200, 300, 400, 500, 600, 700, 100]);
    }

    #[tokio::test]
    async fn test_open_app_milestone_credited_once() {
        let db = seeded_db().await;
        let mut user = test_user(db.pool(), "200").await;
        user.open_app_streak.streak = 7;
        user.open_app_streak.last_open_date = Some(at_day(100));
        assert!(sqlite::update_user(db.pool(), &user).await.unwrap());
        let user = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();

        let credited = sweep_open_app_milestones(db.pool(), &user, at_day(100)).await.unwrap();
        assert_eq!(credited.len(), 1);

        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, 200);

        // Sweeping again credits nothing
        let again = sweep_open_app_milestones(db.pool(), &reloaded, at_day(101)).await.unwrap();
        assert!(again.is_empty());
        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, 200);
    }
}
