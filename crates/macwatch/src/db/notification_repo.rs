//! Notification repository: append-only writes to `notifications`.

use rusqlite::{params, Connection};

use super::{format_timestamp, parse_column, parse_timestamp, DatabaseError};
use crate::model::Notification;

/// Appends a notification.
pub fn insert(conn: &Connection, n: &Notification) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (id, job_id, job_name, kind, message, mac, host, interface,
         is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            n.id,
            n.job_id,
            n.job_name,
            n.kind.as_str(),
            n.message,
            n.mac.as_str(),
            n.host,
            n.interface,
            n.read,
            format_timestamp(n.created_at),
        ],
    )?;
    Ok(())
}

/// Notifications of a job, oldest first.
pub fn list_for_job(conn: &Connection, job_id: i64) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, job_id, job_name, kind, message, mac, host, interface, is_read, created_at
         FROM notifications WHERE job_id = ?1 ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map(params![job_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
                r.get::<_, String>(7)?,
                r.get::<_, bool>(8)?,
                r.get::<_, String>(9)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(id, job_id, job_name, kind, message, mac, host, interface, read, created_at)| {
                Ok(Notification {
                    id,
                    job_id,
                    job_name,
                    kind: parse_column("notifications.kind", &kind)?,
                    message,
                    mac: parse_column("notifications.mac", &mac)?,
                    host,
                    interface,
                    read,
                    created_at: parse_timestamp("notifications.created_at", &created_at)?,
                })
            },
        )
        .collect()
}
