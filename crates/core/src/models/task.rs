//! Task catalog entries and per-user progress rows

use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog entry, admin-seeded and read-only from the core's perspective
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub reward: i64,
    /// Symbolic condition key, e.g. `join_telegram_group`
    pub condition: String,
    pub image_link: String,
    pub is_repeatable: bool,
}

/// Per-(user, task) progress record. Unique on the pair; the sole source
/// of truth for whether a reward has been paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTask {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub status: TaskStatus,
    /// Opaque task-specific progress bag (e.g. connected wallet address)
    pub progress: serde_json::Value,
    pub rewards_claimed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Catalog entry joined with the requesting user's progress, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithStatus {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub reward: i64,
    pub condition: String,
    pub image_link: String,
    pub is_repeatable: bool,
    pub status: TaskStatus,
    pub rewards_claimed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Option<serde_json::Value>,
}
