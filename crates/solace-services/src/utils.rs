//! Small pure helpers shared by the forum and the API layer.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

pub use solace_core::next_vote;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
// Fixed-width approximations, not calendar arithmetic.
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Net score of a voter pair: `|upvotes| - |downvotes|`.
pub fn vote_count(upvotes: &BTreeSet<String>, downvotes: &BTreeSet<String>) -> i64 {
    upvotes.len() as i64 - downvotes.len() as i64
}

/// Human readable age of `then` relative to `now`, e.g. "3 days ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();

    for (width, unit) in [
        (YEAR, "year"),
        (MONTH, "month"),
        (DAY, "day"),
        (HOUR, "hour"),
        (MINUTE, "minute"),
    ] {
        let n = seconds / width;
        if n >= 1 {
            let plural = if n == 1 { "" } else { "s" };
            return format!("{n} {unit}{plural} ago");
        }
    }

    "just now".to_string()
}
