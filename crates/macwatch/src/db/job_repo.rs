//! Job repository: CRUD operations for the `jobs` and `job_whitelist` tables.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_column, parse_timestamp, DatabaseError};
use crate::model::{
    Job, JobStatus, MacAddress, NotificationSettings, RetentionPolicy, VlanId,
};

/// A raw job row from the database.
#[derive(Debug, Clone)]
struct JobRow {
    id: i64,
    name: String,
    vlan_filter: Option<VlanId>,
    notifications_enabled: bool,
    notify_new_macs: bool,
    notify_unauthorized_macs: bool,
    notify_ip_changes: bool,
    retention_policy: String,
    retention_days: Option<u32>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            vlan_filter: row.get("vlan_filter")?,
            notifications_enabled: row.get("notifications_enabled")?,
            notify_new_macs: row.get("notify_new_macs")?,
            notify_unauthorized_macs: row.get("notify_unauthorized_macs")?,
            notify_ip_changes: row.get("notify_ip_changes")?,
            retention_policy: row.get("retention_policy")?,
            retention_days: row.get("retention_days")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_job(self) -> Result<Job, DatabaseError> {
        Ok(Job {
            id: self.id,
            retention: retention_from_columns(&self.retention_policy, self.retention_days)?,
            status: parse_column("jobs.status", &self.status)?,
            created_at: parse_timestamp("jobs.created_at", &self.created_at)?,
            updated_at: parse_timestamp("jobs.updated_at", &self.updated_at)?,
            notifications: NotificationSettings {
                enabled: self.notifications_enabled,
                new_macs: self.notify_new_macs,
                unauthorized_macs: self.notify_unauthorized_macs,
                interface_moves: self.notify_ip_changes,
            },
            name: self.name,
            vlan_filter: self.vlan_filter,
        })
    }
}

fn retention_to_columns(policy: RetentionPolicy) -> (&'static str, Option<u32>) {
    match policy {
        RetentionPolicy::Forever => ("forever", None),
        RetentionPolicy::Days(days) => ("days", Some(days)),
        RetentionPolicy::RemoveImmediately => ("remove_immediately", None),
    }
}

fn retention_from_columns(kind: &str, days: Option<u32>) -> Result<RetentionPolicy, DatabaseError> {
    match (kind, days) {
        ("forever", _) => Ok(RetentionPolicy::Forever),
        ("remove_immediately", _) => Ok(RetentionPolicy::RemoveImmediately),
        ("days", Some(days)) => Ok(RetentionPolicy::Days(days)),
        ("days", None) => Err(DatabaseError::InvalidValue {
            column: "jobs.retention_days",
            value: "NULL".to_string(),
        }),
        (other, _) => Err(DatabaseError::InvalidValue {
            column: "jobs.retention_policy",
            value: other.to_string(),
        }),
    }
}

/// Job attributes supplied when creating a job.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub name: String,
    pub vlan_filter: Option<VlanId>,
    pub notifications: NotificationSettings,
    pub retention: RetentionPolicy,
}

/// Inserts a new job in `active` state and returns its id.
pub fn insert(conn: &Connection, job: &NewJob, now: DateTime<Utc>) -> Result<i64, DatabaseError> {
    let (retention_policy, retention_days) = retention_to_columns(job.retention);
    let ts = format_timestamp(now);
    conn.execute(
        "INSERT INTO jobs (name, vlan_filter, notifications_enabled, notify_new_macs,
         notify_unauthorized_macs, notify_ip_changes, retention_policy, retention_days,
         status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            job.name,
            job.vlan_filter,
            job.notifications.enabled,
            job.notifications.new_macs,
            job.notifications.unauthorized_macs,
            job.notifications.interface_moves,
            retention_policy,
            retention_days,
            JobStatus::Active.as_str(),
            ts,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Job>, DatabaseError> {
    let row = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
        .optional()?;
    row.map(JobRow::into_job).transpose()
}

/// Lists jobs with the given status, ordered by id.
pub fn list_by_status(conn: &Connection, status: JobStatus) -> Result<Vec<Job>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM jobs WHERE status = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map(params![status.as_str()], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(JobRow::into_job).collect()
}

/// Updates only the status and updated_at of a job. Returns false if no
/// such job exists.
pub fn update_status(
    conn: &Connection,
    id: i64,
    status: JobStatus,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), format_timestamp(now)],
    )?;
    Ok(changed > 0)
}

/// Moves an `active` job to `running` in one statement. Returns false if
/// the job is missing or not `active`, e.g. another process claimed it.
pub fn claim_for_run(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        params![
            id,
            JobStatus::Running.as_str(),
            format_timestamp(now),
            JobStatus::Active.as_str()
        ],
    )?;
    Ok(changed > 0)
}

/// Returns every `running` job to `active`. Used after a crash, when no
/// run can actually be in flight.
pub fn reset_running(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE status = ?3",
        params![
            JobStatus::Active.as_str(),
            format_timestamp(now),
            JobStatus::Running.as_str()
        ],
    )?;
    Ok(changed)
}

/// Deletes a job. Hosts, whitelist, inventory, notifications and runs
/// cascade; device history is kept.
pub fn delete(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Adds a MAC to the job whitelist. Adding an existing entry is a no-op.
pub fn add_to_whitelist(
    conn: &Connection,
    job_id: i64,
    mac: &MacAddress,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO job_whitelist (job_id, mac) VALUES (?1, ?2)",
        params![job_id, mac.as_str()],
    )?;
    Ok(())
}

pub fn remove_from_whitelist(
    conn: &Connection,
    job_id: i64,
    mac: &MacAddress,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM job_whitelist WHERE job_id = ?1 AND mac = ?2",
        params![job_id, mac.as_str()],
    )?;
    Ok(changed > 0)
}

/// Loads the whitelist of a job.
pub fn whitelist(conn: &Connection, job_id: i64) -> Result<HashSet<MacAddress>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT mac FROM job_whitelist WHERE job_id = ?1")?;
    let raw = stmt
        .query_map(params![job_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.iter()
        .map(|s| parse_column("job_whitelist.mac", s))
        .collect()
}
