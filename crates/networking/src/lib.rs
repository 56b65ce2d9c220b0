//! Tapcoin Networking - Telegram Bot API client and the membership-check
//! contract the task engine verifies against

pub mod telegram;

pub use telegram::{MembershipCheck, TelegramClient};
