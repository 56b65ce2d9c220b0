//! Mini-games: combo and daily-word guessing, the daily roulette wheel
//! and tapping sessions. Each game gates its payout through the daily
//! window and pushes rewards through the ledger.

pub mod combo;
pub mod daily_word;
pub mod roulette;
pub mod tapping;
