//! Admin-managed daily puzzle content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emoji combination of the day; the guess must match in order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combo {
    pub id: i64,
    pub correct_combination: Vec<String>,
    pub reward: i64,
    pub date: DateTime<Utc>,
}

/// Secret word of the day; matched case-insensitively after trimming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyWord {
    pub id: i64,
    pub word: String,
    pub reward: i64,
    pub date: DateTime<Utc>,
}
