//! Referral engine: single-level bonus propagation, the daily claim of
//! pending earnings and the invite milestone tasks

use crate::window;
use crate::{task, MAX_WRITE_ATTEMPTS};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tapcoin_core::{Error, ReferralSummary, Result, User};
use tapcoin_persistence::sqlite;
use tracing::info;

/// Share of a referee's earnings accrued to their referrer
pub const DEFAULT_REFERRAL_PERCENTAGE: f64 = 0.20;

/// Active-referral milestone thresholds and their catalog conditions
const INVITE_ACTIVE_MILESTONES: &[(u32, &str)] = &[
    (10, "invite_active_10"),
    (30, "invite_active_30"),
    (50, "invite_active_50"),
    (100, "invite_active_100"),
];

/// Premium-referral milestone thresholds and their catalog conditions
const INVITE_PREMIUM_MILESTONES: &[(u32, &str)] = &[
    (10, "invite_premium_10"),
    (20, "invite_premium_20"),
    (50, "invite_premium_50"),
    (100, "invite_premium_100"),
];

/// Accrue the referrer's share of a referee's earning. Single level: the
/// bonus lands on pending counters, never on a balance, so it cannot
/// cascade to the referrer's own referrer. The accrual still leaves an
/// audit record in the referrer's history, tagged with the referee's
/// name. A bonus that rounds to zero accrues nothing.
pub async fn propagate(
    pool: &SqlitePool,
    earner_id: i64,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    if amount <= 0 {
        return Ok(None);
    }

    let Some(edge) = sqlite::get_referral_by_referee(pool, earner_id).await? else {
        return Ok(None);
    };

    let bonus = (amount as f64 * DEFAULT_REFERRAL_PERCENTAGE).round() as i64;
    if bonus == 0 {
        return Ok(None);
    }

    let earner = sqlite::get_user(pool, earner_id)
        .await?
        .ok_or(Error::UserNotFound(earner_id))?;

    sqlite::add_referral_earnings(pool, edge.referrer_id, bonus).await?;
    sqlite::add_edge_earnings(pool, edge.id, bonus).await?;
    let reason = format!("Referral Bonus from {}", earner.display_name());
    sqlite::insert_transaction(pool, edge.referrer_id, bonus, &reason, now).await?;
    info!(
        referrer_id = edge.referrer_id,
        referee_id = earner_id,
        amount,
        bonus,
        at = %now,
        "referral bonus accrued"
    );
    Ok(Some(bonus))
}

/// Move all pending referral earnings onto the balance. Once per UTC
/// day; the settle happens in one SQL transaction guarded on the pending
/// amount, so two concurrent claims (or a claim racing a propagation)
/// can never pay the same pending amount twice, and a failed claim
/// leaves the pending pot untouched.
pub async fn claim(pool: &SqlitePool, user_id: i64, now: DateTime<Utc>) -> Result<(User, i64)> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;

        if window::is_same_day(user.last_referral_claim_date, now) {
            return Err(Error::AlreadyClaimedToday);
        }
        let pending = user.pending_referral_earnings;
        if pending == 0 {
            return Err(Error::NothingToClaim);
        }

        if let Some(updated) =
            sqlite::settle_referral_claim(pool, user_id, pending, "Referral Earnings Claim", now)
                .await?
        {
            info!(user_id, amount = pending, "referral earnings claimed");
            return Ok((updated, pending));
        }
    }

    Err(Error::ConcurrentUpdate)
}

/// Referral overview for the frontend: pending and lifetime totals,
/// whether a claim is possible right now and the per-friend breakdown
pub async fn summary(pool: &SqlitePool, user_id: i64, now: DateTime<Utc>) -> Result<ReferralSummary> {
    let user = sqlite::get_user(pool, user_id)
        .await?
        .ok_or(Error::UserNotFound(user_id))?;
    let friends = sqlite::list_referral_friends(pool, user_id).await?;

    let claimed_today = window::is_same_day(user.last_referral_claim_date, now);
    Ok(ReferralSummary {
        pending_referral_earnings: user.pending_referral_earnings,
        total_referral_earnings: user.total_referral_earnings,
        claim_available: user.pending_referral_earnings > 0 && !claimed_today,
        seconds_until_next_claim: if claimed_today {
            window::seconds_until_next_day(now)
        } else {
            0
        },
        last_claim_date: user.last_referral_claim_date,
        friends,
    })
}

/// Credit every invite milestone task the referrer's counts have
/// reached. Called when referee activity could have moved a count.
pub async fn sweep_invite_milestones(
    pool: &SqlitePool,
    referrer_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let active = sqlite::count_active_referrals(pool, referrer_id).await?;
    let premium = sqlite::count_premium_referrals(pool, referrer_id).await?;

    let mut credited = Vec::new();
    for &(threshold, condition) in INVITE_ACTIVE_MILESTONES {
        if active >= threshold {
            if let Some(task_id) = task::credit_condition(pool, referrer_id, condition, now).await? {
                credited.push(task_id);
            }
        }
    }
    for &(threshold, condition) in INVITE_PREMIUM_MILESTONES {
        if premium >= threshold {
            if let Some(task_id) = task::credit_condition(pool, referrer_id, condition, now).await? {
                credited.push(task_id);
            }
        }
    }
    Ok(credited)
}
