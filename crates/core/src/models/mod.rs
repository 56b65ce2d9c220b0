//! Data models shared across the Tapcoin crates

mod content;
mod referral;
mod task;
mod transaction;
mod user;

pub use content::*;
pub use referral::*;
pub use task::*;
pub use transaction::*;
pub use user::*;
