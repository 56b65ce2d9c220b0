//! Shared type definitions: task lifecycle states and symbolic conditions

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a user's progress on a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    Doing,
    Done,
    /// Reserved; no current condition transitions here
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "not_started" => Ok(TaskStatus::NotStarted),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(Error::InvalidInput(format!("bad task status: {other}"))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbolic task condition from the catalog, parsed from strings like
/// `join_telegram_group` or `guess_combo_30`. Verification dispatches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCondition {
    JoinTelegramGroup,
    JoinTwitterCommunity,
    JoinTiktokCommunity,
    /// Open-app streak milestone (`open_app_{days}_days`)
    OpenAppDays(u32),
    /// Active-referral milestone (`invite_active_{count}`)
    InviteActive(u32),
    /// Premium-referral milestone (`invite_premium_{count}`)
    InvitePremium(u32),
    /// Word-guess streak threshold (`guess_daily_words_{days}`)
    GuessDailyWords(u32),
    /// Combo-guess streak threshold (`guess_combo_{days}`)
    GuessCombo(u32),
    ConnectTonWallet,
}

impl TaskCondition {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "join_telegram_group" => return Ok(TaskCondition::JoinTelegramGroup),
            "join_twitter_community" => return Ok(TaskCondition::JoinTwitterCommunity),
            "join_tiktok_community" => return Ok(TaskCondition::JoinTiktokCommunity),
            "connect_ton_wallet" => return Ok(TaskCondition::ConnectTonWallet),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix("open_app_").and_then(|r| r.strip_suffix("_days")) {
            if let Ok(days) = rest.parse() {
                return Ok(TaskCondition::OpenAppDays(days));
            }
        }
        if let Some(rest) = s.strip_prefix("invite_active_") {
            if let Ok(count) = rest.parse() {
                return Ok(TaskCondition::InviteActive(count));
            }
        }
        if let Some(rest) = s.strip_prefix("invite_premium_") {
            if let Ok(count) = rest.parse() {
                return Ok(TaskCondition::InvitePremium(count));
            }
        }
        if let Some(rest) = s.strip_prefix("guess_daily_words_") {
            if let Ok(days) = rest.parse() {
                return Ok(TaskCondition::GuessDailyWords(days));
            }
        }
        if let Some(rest) = s.strip_prefix("guess_combo_") {
            if let Ok(days) = rest.parse() {
                return Ok(TaskCondition::GuessCombo(days));
            }
        }

        Err(Error::UnknownCondition(s.to_string()))
    }
}

impl fmt::Display for TaskCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskCondition::JoinTelegramGroup => write!(f, "join_telegram_group"),
            TaskCondition::JoinTwitterCommunity => write!(f, "join_twitter_community"),
            TaskCondition::JoinTiktokCommunity => write!(f, "join_tiktok_community"),
            TaskCondition::OpenAppDays(d) => write!(f, "open_app_{d}_days"),
            TaskCondition::InviteActive(c) => write!(f, "invite_active_{c}"),
            TaskCondition::InvitePremium(c) => write!(f, "invite_premium_{c}"),
            TaskCondition::GuessDailyWords(d) => write!(f, "guess_daily_words_{d}"),
            TaskCondition::GuessCombo(d) => write!(f, "guess_combo_{d}"),
            TaskCondition::ConnectTonWallet => write!(f, "connect_ton_wallet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_round_trip() {
        let cases = [
            "join_telegram_group",
            "open_app_30_days",
            "invite_active_100",
            "invite_premium_20",
            "guess_daily_words_90",
            "guess_combo_120",
            "connect_ton_wallet",
        ];
        for s in cases {
            let parsed = TaskCondition::parse(s).unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn test_unknown_condition_rejected() {
        assert!(matches!(
            TaskCondition::parse("dance_on_tiktok"),
            Err(Error::UnknownCondition(_))
        ));
        assert!(matches!(
            TaskCondition::parse("open_app_x_days"),
            Err(Error::UnknownCondition(_))
        ));
    }
}
