//! User aggregate and related embedded state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated Telegram identity handed in by the auth layer.
/// Launch-payload signature validation happens before this struct exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramProfile {
    pub telegram_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Daily check-in state: streak wraps to 1 past day 7, the claim stamp
/// gates the reward to once per calendar day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCheckIn {
    pub streak: i64,
    pub last_check_in_date: Option<DateTime<Utc>>,
    pub last_claim_date: Option<DateTime<Utc>>,
}

/// Open-app streak: uncapped counter checked against the {7, 30, 100}
/// milestone tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAppStreak {
    pub streak: i64,
    pub last_open_date: Option<DateTime<Utc>>,
}

/// Per-day roulette wheel. The winning index is committed at generation
/// time; spinning only reveals it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouletteConfig {
    pub rewards: Vec<i64>,
    pub selected_index: usize,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub last_spin_date: Option<DateTime<Utc>>,
}

/// The central aggregate. `balance` is mutated only through the ledger;
/// everything else is gating/bookkeeping state for the reward engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub telegram_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: bool,
    pub photo_url: Option<String>,
    pub balance: i64,
    pub referral_code: String,
    pub referred_by: Option<i64>,
    pub pending_referral_earnings: i64,
    pub total_referral_earnings: i64,
    pub last_referral_claim_date: Option<DateTime<Utc>>,
    pub daily_check_in: DailyCheckIn,
    pub open_app_streak: OpenAppStreak,
    /// One entry per day the daily word was guessed correctly; streaks are
    /// derived from this log, never cached.
    pub guess_word_dates: Vec<DateTime<Utc>>,
    /// One entry per day a combo was guessed correctly.
    pub guess_combo_dates: Vec<DateTime<Utc>>,
    pub roulette_config: Option<RouletteConfig>,
    pub last_combo_reward_date: Option<DateTime<Utc>>,
    pub last_daily_word_reward_date: Option<DateTime<Utc>>,
    pub cooldown_start: Option<DateTime<Utc>>,
    pub session_count: i64,
    pub ton_wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter; bumped on every guarded write.
    #[serde(skip)]
    pub version: i64,
}

impl User {
    /// Name used in referral transaction reasons and logs
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .unwrap_or(&self.telegram_id)
    }
}
