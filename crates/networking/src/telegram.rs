//! Telegram Bot API client for group-membership verification

use serde::Deserialize;
use std::future::Future;
use tapcoin_core::{Error, Result};
use tracing::{debug, warn};

const API_BASE: &str = "https://api.telegram.org";

/// External membership lookup used by the `join_telegram_group` task.
/// A failed lookup means "not verified yet", never a permanently failed
/// task; callers retry on the next check.
pub trait MembershipCheck: Send + Sync {
    fn is_member(&self, telegram_id: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Response envelope from the Bot API
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<ChatMember>,
    #[serde(default)]
    description: Option<String>,
}

/// Subset of the getChatMember result we care about
#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}

/// HTTP client for the Telegram Bot API
pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
    group_chat_id: String,
}

impl TelegramClient {
    /// Create a client for the configured bot and community group
    /// (`group_chat_id` like `@yourgroup` or a numeric chat id)
    pub fn new(bot_token: &str, group_chat_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token: bot_token.to_string(),
            group_chat_id: group_chat_id.to_string(),
        }
    }

    async fn get_chat_member(&self, telegram_id: &str) -> Result<BotApiResponse> {
        let url = format!("{API_BASE}/bot{}/getChatMember", self.bot_token);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("chat_id", self.group_chat_id.as_str()),
                ("user_id", telegram_id),
            ])
            .send()
            .await?;

        let body: BotApiResponse = response.json().await?;
        Ok(body)
    }
}

impl MembershipCheck for TelegramClient {
    /// True when the user is in the group as creator, administrator or
    /// plain member; `restricted`, `left` and `kicked` do not count.
    async fn is_member(&self, telegram_id: &str) -> Result<bool> {
        let body = self.get_chat_member(telegram_id).await?;

        if !body.ok {
            let description = body.description.unwrap_or_else(|| "no description".into());
            warn!(telegram_id, %description, "Telegram API rejected getChatMember");
            return Err(Error::ExternalCheckFailed(description));
        }

        let status = body.result.map(|m| m.status).unwrap_or_default();
        debug!(telegram_id, %status, "chat member status");
        Ok(status_is_member(&status))
    }
}

fn status_is_member(status: &str) -> bool {
    matches!(status, "creator" | "administrator" | "member")
}
