//! Host repository: CRUD operations for the `hosts` table.

use rusqlite::{params, Connection, Row};

use super::DatabaseError;
use crate::model::Host;

fn host_from_row(row: &Row<'_>) -> Result<Host, rusqlite::Error> {
    Ok(Host {
        id: row.get("id")?,
        job_id: row.get("job_id")?,
        name: row.get("name")?,
        address: row.get("address")?,
        port: row.get("port")?,
        username: row.get("username")?,
        enabled: row.get("enabled")?,
    })
}

/// Host attributes supplied when attaching a host to a job.
#[derive(Debug, Clone)]
pub struct NewHost {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
    pub enabled: bool,
}

impl NewHost {
    /// An enabled host on the default SSH port.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: 22,
            username: None,
            enabled: true,
        }
    }
}

/// Inserts a host for a job and returns its id.
pub fn insert(conn: &Connection, job_id: i64, host: &NewHost) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO hosts (job_id, name, address, port, username, enabled)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            job_id,
            host.name,
            host.address,
            host.port,
            host.username,
            host.enabled
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Enabled hosts of a job, in insertion order. This order defines the
/// order of the pooled observation batch.
pub fn list_enabled(conn: &Connection, job_id: i64) -> Result<Vec<Host>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM hosts WHERE job_id = ?1 AND enabled = 1 ORDER BY id")?;
    let hosts = stmt
        .query_map(params![job_id], host_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hosts)
}

/// All hosts of a job, enabled or not.
pub fn list_by_job(conn: &Connection, job_id: i64) -> Result<Vec<Host>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM hosts WHERE job_id = ?1 ORDER BY id")?;
    let hosts = stmt
        .query_map(params![job_id], host_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hosts)
}

/// Enables or disables a host without deleting it.
pub fn set_enabled(conn: &Connection, id: i64, enabled: bool) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE hosts SET enabled = ?2 WHERE id = ?1",
        params![id, enabled],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM hosts WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
