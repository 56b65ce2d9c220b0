//! Tapcoin Persistence - SQLite storage for users, tasks, referrals,
//! daily content and the deferred verification queue

pub mod sqlite;

pub use sqlite::Database;
