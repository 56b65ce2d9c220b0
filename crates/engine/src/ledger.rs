//! Ledger: the only way a balance changes. Each credit (or debit, with
//! a negative amount) is an atomic read-modify-write paired with exactly
//! one audit record; a ledger entry never changes the balance without
//! logging it, and never logs without changing it.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tapcoin_core::{Error, Result, User};
use tapcoin_persistence::sqlite;
use tracing::info;

/// Apply `amount` to the user's balance and append the audit record.
/// Negative amounts are a reserved debit capability: any debit that
/// would take the balance below zero fails with `InsufficientBalance`
/// and changes nothing. Referral bonuses are NOT propagated here;
/// callers that owe one invoke the referral engine explicitly.
pub async fn credit(
    pool: &SqlitePool,
    user_id: i64,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<User> {
    if amount == 0 {
        return Err(Error::InvalidInput("zero-amount ledger entry".into()));
    }

    let user = sqlite::credit_balance(pool, user_id, amount, reason, now).await?;
    info!(user_id, amount, reason, balance = user.balance, "ledger entry recorded");
    Ok(user)
}

/// Credit together with the caller's version-guarded user write, in one
/// SQL transaction. Daily-gate flows stamp their gate on `user` and pay
/// through this, so a committed stamp always has its reward and a failed
/// credit rolls the stamp back. Returns `None` when another writer
/// invalidated the guarded state; callers reload and retry.
pub async fn credit_and_update(
    pool: &SqlitePool,
    user: &User,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    if amount == 0 {
        return Err(Error::InvalidInput("zero-amount ledger entry".into()));
    }

    let updated = sqlite::update_user_and_credit(pool, user, amount, reason, now).await?;
    if let Some(updated) = &updated {
        info!(
            user_id = user.id,
            amount,
            reason,
            balance = updated.balance,
            "ledger entry recorded"
        );
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at_day, test_db, test_user};
    use tapcoin_persistence::sqlite;

    #[tokio::test]
    async fn test_credit_updates_balance_and_appends_audit() {
        let db = test_db().await;
        let user = test_user(db.pool(), "100").await;
        let now = at_day(100);

        let updated = credit(db.pool(), user.id, 250, "Tapping Session Reward", now)
            .await
            .unwrap();
        assert_eq!(updated.balance, 250);

        let log = sqlite::get_transactions(db.pool(), user.id, 10, 0).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].amount, 250);
        assert_eq!(log[0].reason, "Tapping Session Reward");
    }

    #[tokio::test]
    async fn test_debit_below_zero_rejected_without_mutation() {
        let db = test_db().await;
        let user = test_user(db.pool(), "100").await;
        let now = at_day(100);

        credit(db.pool(), user.id, 100, "seed", now).await.unwrap();
        let err = credit(db.pool(), user.id, -150, "overdraft", now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBalance { required: 150, available: 100 }
        ));

        // Balance untouched, no audit row for the failed debit
        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, 100);
        assert_eq!(sqlite::count_transactions(db.pool(), user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_debit_within_balance_succeeds() {
        let db = test_db().await;
        let user = test_user(db.pool(), "100").await;
        let now = at_day(100);

        credit(db.pool(), user.id, 100, "seed", now).await.unwrap();
        let updated = credit(db.pool(), user.id, -40, "spend", now).await.unwrap();
        assert_eq!(updated.balance, 60);
    }

    #[tokio::test]
    async fn test_transactions_listed_newest_first() {
        let db = test_db().await;
        let user = test_user(db.pool(), "100").await;

        credit(db.pool(), user.id, 10, "first", at_day(100)).await.unwrap();
        credit(db.pool(), user.id, 20, "second", at_day(101)).await.unwrap();
        credit(db.pool(), user.id, 30, "third", at_day(102)).await.unwrap();

        let log = sqlite::get_transactions(db.pool(), user.id, 10, 0).await.unwrap();
        let reasons: Vec<_> = log.iter().map(|t| t.reason.as_str()).collect();
        assert_eq!(reasons, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let db = test_db().await;
        let user = test_user(db.pool(), "100").await;

        let err = credit(db.pool(), user.id, 0, "noop", at_day(100)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let db = test_db().await;
        let err = credit(db.pool(), 9999, 10, "ghost", at_day(100)).await.unwrap_err();
        assert!(matches!(err, Error::UserNotFound(9999)));
    }

    #[tokio::test]
    async fn test_credit_and_update_commits_state_with_the_reward() {
        let db = test_db().await;
        let mut user = test_user(db.pool(), "100").await;
        user.session_count = 3;

        let updated = credit_and_update(db.pool(), &user, 100, "Tapping Session Reward", at_day(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.balance, 100);
        assert_eq!(updated.session_count, 3);
        assert_eq!(sqlite::count_transactions(db.pool(), user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_credit_rolls_back_the_state_write() {
        let db = test_db().await;
        let mut user = test_user(db.pool(), "100").await;
        user.session_count = 3;

        // Balance is 0; the overdraft fails, and the session count stamped
        // in the same transaction must not survive it
        let err = credit_and_update(db.pool(), &user, -50, "overdraft", at_day(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));

        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.session_count, 0);
        assert_eq!(reloaded.balance, 0);
        assert_eq!(sqlite::count_transactions(db.pool(), user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_state_credits_nothing() {
        let db = test_db().await;
        let user = test_user(db.pool(), "100").await;

        // Another writer bumps the version first
        let mut fresh = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        fresh.session_count = 1;
        assert!(sqlite::update_user(db.pool(), &fresh).await.unwrap());

        let mut stale = user.clone();
        stale.session_count = 9;
        let outcome = credit_and_update(db.pool(), &stale, 100, "Tapping Session Reward", at_day(100))
            .await
            .unwrap();
        assert!(outcome.is_none());

        let reloaded = sqlite::get_user(db.pool(), user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, 0);
        assert_eq!(reloaded.session_count, 1);
        assert_eq!(sqlite::count_transactions(db.pool(), user.id).await.unwrap(), 0);
    }
}
