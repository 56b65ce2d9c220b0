//! Daily-window evaluator. Every daily gate and streak in the engine
//! classifies timestamps through here, using one canonical day boundary:
//! the UTC day index (unix timestamp divided by 86 400).

use chrono::{DateTime, Utc};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Relation between a previous event and "now" in calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWindow {
    /// Same UTC day; daily actions are a no-op
    SameDay,
    /// Exactly the next UTC day; streaks continue
    Consecutive,
    /// A gap, or no previous event at all; streaks restart at 1
    Broken,
}

/// UTC day index of a timestamp. Negative timestamps floor-divide so the
/// boundary stays midnight-aligned either side of the epoch.
pub fn day_index(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(SECONDS_PER_DAY)
}

/// Classify `now` against the last event date
pub fn classify(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DayWindow {
    let Some(last) = last else {
        return DayWindow::Broken;
    };

    match day_index(now) - day_index(last) {
        0 => DayWindow::SameDay,
        1 => DayWindow::Consecutive,
        _ => DayWindow::Broken,
    }
}

/// True when the last event happened on the current UTC day
pub fn is_same_day(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    classify(last, now) == DayWindow::SameDay
}

/// Start (inclusive) and end (exclusive) of the UTC day containing `now`
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_secs = day_index(now) * SECONDS_PER_DAY;
    let start = DateTime::from_timestamp(start_secs, 0).expect("day start in range");
    let end = DateTime::from_timestamp(start_secs + SECONDS_PER_DAY, 0).expect("day end in range");
    (start, end)
}

/// Seconds until the next UTC midnight, for countdown responses
pub fn seconds_until_next_day(now: DateTime<Utc>) -> i64 {
    (day_index(now) + 1) * SECONDS_PER_DAY - now.timestamp()
}
