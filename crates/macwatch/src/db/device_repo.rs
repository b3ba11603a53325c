//! Device repository: the `known_devices` inventory and the append-only
//! `device_history` audit trail.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_column, parse_timestamp, DatabaseError};
use crate::model::{
    DeviceHistoryEntry, DeviceKey, DeviceStatus, KnownDevice, MacAddress, VlanId,
};

// ─── Known devices ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct KnownDeviceRow {
    job_id: i64,
    mac: String,
    host: String,
    interface: String,
    vlan: VlanId,
    whitelisted: bool,
    first_seen: String,
    last_seen: String,
    status: String,
}

impl KnownDeviceRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            mac: row.get("mac")?,
            host: row.get("host")?,
            interface: row.get("interface")?,
            vlan: row.get("vlan")?,
            whitelisted: row.get("whitelisted")?,
            first_seen: row.get("first_seen")?,
            last_seen: row.get("last_seen")?,
            status: row.get("status")?,
        })
    }

    fn into_device(self) -> Result<KnownDevice, DatabaseError> {
        Ok(KnownDevice {
            job_id: self.job_id,
            mac: parse_column("known_devices.mac", &self.mac)?,
            host: self.host,
            interface: self.interface,
            vlan: self.vlan,
            whitelisted: self.whitelisted,
            first_seen: parse_timestamp("known_devices.first_seen", &self.first_seen)?,
            last_seen: parse_timestamp("known_devices.last_seen", &self.last_seen)?,
            status: parse_column("known_devices.status", &self.status)?,
        })
    }
}

/// Inserts a new inventory record.
pub fn insert(conn: &Connection, device: &KnownDevice) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO known_devices (job_id, mac, host, interface, vlan, whitelisted,
         first_seen, last_seen, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            device.job_id,
            device.mac.as_str(),
            device.host,
            device.interface,
            device.vlan,
            device.whitelisted,
            format_timestamp(device.first_seen),
            format_timestamp(device.last_seen),
            device.status.as_str(),
        ],
    )?;
    Ok(())
}

/// Records a fresh sighting of a known device: new interface/VLAN,
/// last-seen bumped, status back to `active`.
pub fn record_sighting(
    conn: &Connection,
    job_id: i64,
    key: &DeviceKey,
    interface: &str,
    vlan: VlanId,
    seen_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE known_devices SET interface = ?4, vlan = ?5, last_seen = ?6, status = ?7
         WHERE job_id = ?1 AND mac = ?2 AND host = ?3",
        params![
            job_id,
            key.mac.as_str(),
            key.host,
            interface,
            vlan,
            format_timestamp(seen_at),
            DeviceStatus::Active.as_str(),
        ],
    )?;
    Ok(changed > 0)
}

/// Marks a device `inactive`; the row itself is kept.
pub fn mark_inactive(conn: &Connection, job_id: i64, key: &DeviceKey) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE known_devices SET status = ?4 WHERE job_id = ?1 AND mac = ?2 AND host = ?3",
        params![
            job_id,
            key.mac.as_str(),
            key.host,
            DeviceStatus::Inactive.as_str()
        ],
    )?;
    Ok(changed > 0)
}

pub fn find(
    conn: &Connection,
    job_id: i64,
    key: &DeviceKey,
) -> Result<Option<KnownDevice>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM known_devices WHERE job_id = ?1 AND mac = ?2 AND host = ?3",
            params![job_id, key.mac.as_str(), key.host],
            KnownDeviceRow::from_row,
        )
        .optional()?;
    row.map(KnownDeviceRow::into_device).transpose()
}

/// All inventory records of a job, ordered by MAC then host.
pub fn list_for_job(conn: &Connection, job_id: i64) -> Result<Vec<KnownDevice>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM known_devices WHERE job_id = ?1 ORDER BY mac, host")?;
    let rows = stmt
        .query_map(params![job_id], KnownDeviceRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(KnownDeviceRow::into_device).collect()
}

/// Inventory of a job keyed by device identity.
pub fn load_keyed(
    conn: &Connection,
    job_id: i64,
) -> Result<HashMap<DeviceKey, KnownDevice>, DatabaseError> {
    Ok(list_for_job(conn, job_id)?
        .into_iter()
        .map(|d| (d.key(), d))
        .collect())
}

/// Deletes every `inactive` device of a job.
pub fn delete_inactive(conn: &Connection, job_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM known_devices WHERE job_id = ?1 AND status = ?2",
        params![job_id, DeviceStatus::Inactive.as_str()],
    )?;
    Ok(deleted)
}

/// Deletes `inactive` devices of a job last seen strictly before `cutoff`.
pub fn delete_inactive_seen_before(
    conn: &Connection,
    job_id: i64,
    cutoff: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM known_devices WHERE job_id = ?1 AND status = ?2 AND last_seen < ?3",
        params![
            job_id,
            DeviceStatus::Inactive.as_str(),
            format_timestamp(cutoff)
        ],
    )?;
    Ok(deleted)
}

// ─── History ────────────────────────────────────────────────────────────────

/// Appends one audit record. History rows are never updated.
pub fn append_history(conn: &Connection, entry: &DeviceHistoryEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO device_history (job_id, run_id, mac, host, interface, vlan, observed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.job_id,
            entry.run_id,
            entry.mac.as_str(),
            entry.host,
            entry.interface,
            entry.vlan,
            format_timestamp(entry.observed_at),
        ],
    )?;
    Ok(())
}

/// Every recorded sighting of a MAC within a job, oldest first.
pub fn history_for_mac(
    conn: &Connection,
    job_id: i64,
    mac: &MacAddress,
) -> Result<Vec<DeviceHistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT job_id, run_id, mac, host, interface, vlan, observed_at FROM device_history
         WHERE job_id = ?1 AND mac = ?2 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![job_id, mac.as_str()], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, VlanId>(5)?,
                r.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(job_id, run_id, mac, host, interface, vlan, observed_at)| {
            Ok(DeviceHistoryEntry {
                job_id,
                run_id,
                mac: parse_column("device_history.mac", &mac)?,
                host,
                interface,
                vlan,
                observed_at: parse_timestamp("device_history.observed_at", &observed_at)?,
            })
        })
        .collect()
}

pub fn count_history(conn: &Connection, job_id: i64) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM device_history WHERE job_id = ?1",
        params![job_id],
        |r| r.get(0),
    )?;
    Ok(count)
}
