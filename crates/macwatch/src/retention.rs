//! Retention of inactive inventory records.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::{device_repo, DatabaseError};
use crate::model::RetentionPolicy;

/// Deletes the inactive devices of `job_id` that `policy` no longer keeps
/// and returns how many were deleted. Active devices and device history
/// are never touched.
pub fn enforce(
    conn: &Connection,
    job_id: i64,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let deleted = match policy {
        RetentionPolicy::Forever => 0,
        RetentionPolicy::RemoveImmediately => device_repo::delete_inactive(conn, job_id)?,
        RetentionPolicy::Days(days) => match retention_cutoff(now, days) {
            Some(cutoff) => device_repo::delete_inactive_seen_before(conn, job_id, cutoff)?,
            // Older than any representable time: nothing qualifies.
            None => 0,
        },
    };

    if deleted > 0 {
        tracing::info!(job_id, deleted, ?policy, "Pruned inactive devices");
    }
    Ok(deleted)
}

/// `now` minus `days`, or `None` when that is before the earliest
/// representable timestamp.
fn retention_cutoff(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(days)).and_then(|age| now.checked_sub_signed(age))
}
