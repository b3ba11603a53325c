//! Job run repository: CRUD operations for the `job_runs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_column, parse_timestamp, DatabaseError};
use crate::model::{JobRun, RunStatus};

/// A raw job run row from the database.
#[derive(Debug)]
struct JobRunRow {
    id: String,
    job_id: i64,
    status: String,
    hosts_scanned: u32,
    devices_found: u32,
    new_devices: u32,
    warnings: u32,
    started_at: String,
    finished_at: Option<String>,
    error: Option<String>,
    log: String,
}

impl JobRunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            status: row.get("status")?,
            hosts_scanned: row.get("hosts_scanned")?,
            devices_found: row.get("devices_found")?,
            new_devices: row.get("new_devices")?,
            warnings: row.get("warnings")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            error: row.get("error")?,
            log: row.get("log")?,
        })
    }

    fn into_run(self) -> Result<JobRun, DatabaseError> {
        Ok(JobRun {
            status: parse_column("job_runs.status", &self.status)?,
            started_at: parse_timestamp("job_runs.started_at", &self.started_at)?,
            finished_at: self
                .finished_at
                .as_deref()
                .map(|s| parse_timestamp("job_runs.finished_at", s))
                .transpose()?,
            log: serde_json::from_str(&self.log)?,
            id: self.id,
            job_id: self.job_id,
            hosts_scanned: self.hosts_scanned,
            devices_found: self.devices_found,
            new_devices: self.new_devices,
            warnings: self.warnings,
            error: self.error,
        })
    }
}

/// Inserts a new run row.
pub fn insert(conn: &Connection, run: &JobRun) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO job_runs (id, job_id, status, hosts_scanned, devices_found, new_devices,
         warnings, started_at, finished_at, error, log)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            run.id,
            run.job_id,
            run.status.as_str(),
            run.hosts_scanned,
            run.devices_found,
            run.new_devices,
            run.warnings,
            format_timestamp(run.started_at),
            run.finished_at.map(format_timestamp),
            run.error,
            serde_json::to_string(&run.log)?,
        ],
    )?;
    Ok(())
}

/// Writes the final state of a run.
///
/// Only a run still in `running` state is updated, so a run is finalized
/// at most once. Returns false if the run was already finalized.
pub fn finalize(conn: &Connection, run: &JobRun) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE job_runs SET status = ?2, hosts_scanned = ?3, devices_found = ?4,
         new_devices = ?5, warnings = ?6, finished_at = ?7, error = ?8, log = ?9
         WHERE id = ?1 AND status = ?10",
        params![
            run.id,
            run.status.as_str(),
            run.hosts_scanned,
            run.devices_found,
            run.new_devices,
            run.warnings,
            run.finished_at.map(format_timestamp),
            run.error,
            serde_json::to_string(&run.log)?,
            RunStatus::Running.as_str(),
        ],
    )?;
    Ok(changed > 0)
}

/// Finds a run by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRun>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM job_runs WHERE id = ?1",
            params![id],
            JobRunRow::from_row,
        )
        .optional()?;
    row.map(JobRunRow::into_run).transpose()
}

/// Runs of a job, newest first.
pub fn list_for_job(conn: &Connection, job_id: i64) -> Result<Vec<JobRun>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM job_runs WHERE job_id = ?1 ORDER BY started_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![job_id], JobRunRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(JobRunRow::into_run).collect()
}

/// Marks every run still `running` as `failed`. Only valid when no run
/// can be in flight, i.e. at process start.
pub fn fail_interrupted(
    conn: &Connection,
    message: &str,
    now: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE job_runs SET status = ?1, error = ?2, finished_at = ?3 WHERE status = ?4",
        params![
            RunStatus::Failed.as_str(),
            message,
            format_timestamp(now),
            RunStatus::Running.as_str()
        ],
    )?;
    Ok(changed)
}
