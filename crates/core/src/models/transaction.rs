//! Append-only balance audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ledger entry. Rows are never updated or deleted; consumers read
/// them ordered by date descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub reason: String,
    pub date: DateTime<Utc>,
}
