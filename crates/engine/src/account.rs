//! Registration and login. Every visit refreshes the Telegram profile,
//! advances the daily streaks and sweeps the open-app milestones.

use crate::{referral, streak, window, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result, TelegramProfile, User};
use tapcoin_persistence::sqlite;
use tracing::{info, warn};

const REFERRAL_CODE_LEN: usize = 8;
const CODE_GENERATION_ATTEMPTS: usize = 10;

/// Check-in state reported with every login, for the frontend's daily
/// reward panel
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInStatus {
    pub streak: i64,
    pub today_reward: i64,
    pub tomorrow_reward: i64,
    pub claimed_today: bool,
    pub seconds_until_reset: i64,
}

/// Result of a visit through the auth layer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub user: User,
    /// True when this visit registered a new account
    pub created: bool,
    pub check_in: CheckInStatus,
    /// Open-app milestone tasks credited by this visit
    pub open_app_milestones: Vec<i64>,
}

/// Log a user in, registering them first if this Telegram identity is
/// new. A referral code given at registration links the new account to
/// its referrer; an unknown code is ignored rather than blocking signup.
pub async fn register_or_login(
    pool: &SqlitePool,
    profile: &TelegramProfile,
    referral_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<LoginOutcome> {
    let existing = sqlite::get_user_by_telegram_id(pool, &profile.telegram_id).await?;
    let created = existing.is_none();

    let user_id = match existing {
        Some(user) => user.id,
        None => register(pool, profile, referral_code, now).await?,
    };

    let user = advance_visit(pool, user_id, profile, now).await?;
    let open_app_milestones = streak::sweep_open_app_milestones(pool, &user, now).await?;
    let check_in = check_in_status(&user, now);

    Ok(LoginOutcome { user, created, check_in, open_app_milestones })
}

fn check_in_status(user: &User, now: DateTime<Utc>) -> CheckInStatus {
    let streak = user.daily_check_in.streak;
    let tomorrow_streak = if streak >= streak::CHECK_IN_CYCLE_DAYS { 1 } else { streak + 1 };
    CheckInStatus {
        streak,
        today_reward: streak * streak::CHECK_IN_REWARD_PER_DAY,
        tomorrow_reward: tomorrow_streak * streak::CHECK_IN_REWARD_PER_DAY,
        claimed_today: window::is_same_day(user.daily_check_in.last_claim_date, now),
        seconds_until_reset: window::seconds_until_next_day(now),
    }
}

async fn register(
    pool: &SqlitePool,
    profile: &TelegramProfile,
    referral_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<i64> {
    let referrer = match referral_code {
        Some(code) => {
            let found = sqlite::get_user_by_referral_code(pool, code).await?;
            if found.is_none() {
                warn!(telegram_id = %profile.telegram_id, code, "unknown referral code ignored");
            }
            found
        }
        None => None,
    };

    let own_code = generate_referral_code(pool).await?;
    let user = sqlite::create_user(
        pool,
        profile,
        &own_code,
        referrer.as_ref().map(|r| r.id),
        now,
    )
    .await?;
    info!(user_id = user.id, telegram_id = %profile.telegram_id, "user registered");

    if let Some(referrer) = referrer {
        sqlite::create_referral(pool, referrer.id, user.id).await?;
        referral::sweep_invite_milestones(pool, referrer.id, now).await?;
    }

    Ok(user.id)
}

/// Refresh the profile, stamp the login and advance both daily streaks
async fn advance_visit(
    pool: &SqlitePool,
    user_id: i64,
    profile: &TelegramProfile,
    now: DateTime<Utc>,
) -> Result<User> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let mut user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        user.username = profile.username.clone();
        user.first_name = profile.first_name.clone();
        user.last_name = profile.last_name.clone();
        user.language_code = profile.language_code.clone();
        user.is_premium = profile.is_premium;
        user.photo_url = profile.photo_url.clone();
        user.last_login = Some(now);

        streak::advance_open_app(&mut user.open_app_streak, now);
        streak::advance_check_in(&mut user.daily_check_in, now);

        if sqlite::update_user(pool, &user).await? {
            return sqlite::get_user(pool, user_id)
                .await?
                .ok_or(Error::UserNotFound(user_id));
        }
    }

    Err(Error::ConcurrentUpdate)
}

async fn generate_referral_code(pool: &SqlitePool) -> Result<String> {
    for _ in 0..CODE_GENERATION_ATTEMPTS {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REFERRAL_CODE_LEN)
            .map(|c| (c as char).to_ascii_uppercase())
            .collect();

        if sqlite::get_user_by_referral_code(pool, &code).await?.is_none() {
            return Ok(code);
        }
    }

    Err(Error::DatabaseError("could not generate a unique referral code".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streak;
    use crate::testutil::{at_day, profile, seeded_db};
    use tapcoin_persistence::sqlite;

    #[tokio::test]
    async fn test_first_visit_registers() {
        let db = seeded_db().await;
        let outcome = register_or_login(db.pool(), &profile("600"), None, at_day(100))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.user.referral_code.len(), REFERRAL_CODE_LEN);
        assert_eq!(outcome.user.open_app_streak.streak, 1);
        assert_eq!(outcome.user.daily_check_in.streak, 1);
        assert_eq!(outcome.user.last_login, Some(at_day(100)));
        assert!(outcome.open_app_milestones.is_empty());

        assert_eq!(outcome.check_in.today_reward, 100);
        assert_eq!(outcome.check_in.tomorrow_reward, 200);
        assert!(!outcome.check_in.claimed_today);
        assert!(outcome.check_in.seconds_until_reset > 0);
    }

    #[tokio::test]
    async fn test_login_reports_claimed_today() {
        let db = seeded_db().await;
        let user = register_or_login(db.pool(), &profile("600"), None, at_day(100))
            .await
            .unwrap()
            .user;
        streak::claim_check_in(db.pool(), user.id, at_day(100)).await.unwrap();

        let outcome = register_or_login(db.pool(), &profile("600"), None, at_day(100))
            .await
            .unwrap();
        assert!(outcome.check_in.claimed_today);
    }

    #[tokio::test]
    async fn test_check_in_status_wraps_tomorrow_reward_at_cycle_end() {
        let db = seeded_db().await;
        let mut outcome = None;
        for day in 0..7 {
            outcome = Some(
                register_or_login(db.pool(), &profile("600"), None, at_day(100 + day))
                    .await
                    .unwrap(),
            );
        }
        let check_in = outcome.unwrap().check_in;
        assert_eq!(check_in.today_reward, 700);
        assert_eq!(check_in.tomorrow_reward, 100);
    }

    #[tokio::test]
    async fn test_second_visit_same_day_changes_nothing() {
        let db = seeded_db().await;
        register_or_login(db.pool(), &profile("600"), None, at_day(100)).await.unwrap();
        let outcome = register_or_login(db.pool(), &profile("600"), None, at_day(100))
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.user.open_app_streak.streak, 1);
        assert_eq!(outcome.user.daily_check_in.streak, 1);
    }

    #[tokio::test]
    async fn test_daily_visits_grow_open_app_streak() {
        let db = seeded_db().await;
        let mut last = None;
        for day in 0..3 {
            last = Some(
                register_or_login(db.pool(), &profile("600"), None, at_day(100 + day))
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(last.unwrap().user.open_app_streak.streak, 3);
    }

    #[tokio::test]
    async fn test_visit_after_gap_resets_open_app_streak() {
        let db = seeded_db().await;
        register_or_login(db.pool(), &profile("600"), None, at_day(100)).await.unwrap();
        register_or_login(db.pool(), &profile("600"), None, at_day(101)).await.unwrap();
        let outcome = register_or_login(db.pool(), &profile("600"), None, at_day(105))
            .await
            .unwrap();
        assert_eq!(outcome.user.open_app_streak.streak, 1);
    }

    #[tokio::test]
    async fn test_seven_daily_visits_credit_the_milestone() {
        let db = seeded_db().await;
        let mut credited = Vec::new();
        for day in 0..7 {
            let outcome = register_or_login(db.pool(), &profile("600"), None, at_day(100 + day))
                .await
                .unwrap();
            credited.extend(outcome.open_app_milestones);
        }
        assert_eq!(credited.len(), 1);

        let user = sqlite::get_user_by_telegram_id(db.pool(), "600").await.unwrap().unwrap();
        assert_eq!(user.balance, 200);
    }

    #[tokio::test]
    async fn test_registration_with_referral_code_links_edge() {
        let db = seeded_db().await;
        let referrer = register_or_login(db.pool(), &profile("600"), None, at_day(100))
            .await
            .unwrap()
            .user;
        let referee = register_or_login(
            db.pool(),
            &profile("601"),
            Some(&referrer.referral_code),
            at_day(100),
        )
        .await
        .unwrap()
        .user;

        assert_eq!(referee.referred_by, Some(referrer.id));
        let edge = sqlite::get_referral_by_referee(db.pool(), referee.id).await.unwrap().unwrap();
        assert_eq!(edge.referrer_id, referrer.id);
    }

    #[tokio::test]
    async fn test_unknown_referral_code_ignored() {
        let db = seeded_db().await;
        let outcome = register_or_login(db.pool(), &profile("600"), Some("NOPE1234"), at_day(100))
            .await
            .unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.user.referred_by, None);
    }

    #[tokio::test]
    async fn test_login_advance_counts_toward_check_in_claim() {
        let db = seeded_db().await;
        let user = register_or_login(db.pool(), &profile("600"), None, at_day(100))
            .await
            .unwrap()
            .user;

        // Day one: login advanced the streak to 1, claim pays 100
        let (_, reward) = streak::claim_check_in(db.pool(), user.id, at_day(100)).await.unwrap();
        assert_eq!(reward, 100);

        // Day two: login advances to 2 before the claim
        register_or_login(db.pool(), &profile("600"), None, at_day(101)).await.unwrap();
        let (_, reward) = streak::claim_check_in(db.pool(), user.id, at_day(101)).await.unwrap();
        assert_eq!(reward, 200);
    }

    #[tokio::test]
    async fn test_visit_refreshes_profile_fields() {
        let db = seeded_db().await;
        register_or_login(db.pool(), &profile("600"), None, at_day(100)).await.unwrap();

        let mut updated = profile("600");
        updated.username = Some("renamed".into());
        updated.is_premium = true;
        let outcome = register_or_login(db.pool(), &updated, None, at_day(101)).await.unwrap();

        assert_eq!(outcome.user.username.as_deref(), Some("renamed"));
        assert!(outcome.user.is_premium);
    }
}
