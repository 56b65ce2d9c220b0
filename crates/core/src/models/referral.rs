//! Referral edges and summary views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directed referrer -> referee relationship with cumulative earnings.
/// Created once at registration, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: i64,
    pub referrer_id: i64,
    pub referee_id: i64,
    pub total_earnings_from_referee: i64,
    pub earnings_since_last_claim: i64,
}

/// One referee entry in the referrer's friends list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralFriend {
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub photo_url: String,
    pub total_earnings_from_referee: i64,
}

/// Referral overview returned to the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub pending_referral_earnings: i64,
    pub total_referral_earnings: i64,
    pub claim_available: bool,
    pub seconds_until_next_claim: i64,
    pub last_claim_date: Option<DateTime<Utc>>,
    pub friends: Vec<ReferralFriend>,
}
