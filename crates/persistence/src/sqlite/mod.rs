//! SQLite database management

mod connection;
mod content;
mod deferred;
mod referrals;
mod tasks;
mod transactions;
mod user_tasks;
mod users;

pub use connection::Database;
pub use content::*;
pub use deferred::*;
pub use referrals::*;
pub use tasks::*;
pub use transactions::*;
pub use user_tasks::*;
pub use users::*;
