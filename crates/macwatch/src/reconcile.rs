//! Reconciliation of one scan batch against the stored inventory.
//!
//! Compares the pooled observations of a run with the known devices of
//! the job, writes the resulting inventory changes and returns the events
//! the notifier turns into notifications.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::{device_repo, DatabaseError};
use crate::model::{
    DeviceEvent, DeviceHistoryEntry, DeviceKey, DeviceStatus, KnownDevice, MacAddress,
    Observation,
};

/// Counters and events produced by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Distinct (MAC, host) keys in the batch.
    pub devices_found: u32,
    pub new_devices: u32,
    /// Previously active devices not seen in this batch.
    pub marked_inactive: u32,
    pub events: Vec<DeviceEvent>,
}

/// Collapses same-key observations. The last observation of a key wins;
/// keys keep the order of their first appearance.
fn collapse(batch: &[Observation]) -> Vec<(DeviceKey, &Observation)> {
    let mut order: Vec<DeviceKey> = Vec::new();
    let mut latest: HashMap<DeviceKey, &Observation> = HashMap::new();

    for obs in batch {
        let key = obs.key();
        if latest.insert(key.clone(), obs).is_none() {
            order.push(key);
        }
    }

    order
        .into_iter()
        .filter_map(|key| latest.remove(&key).map(|obs| (key, obs)))
        .collect()
}

/// Merges `batch` into the inventory of `job_id`.
///
/// `whitelist` is the snapshot of authorized MACs taken for this run.
/// Must run inside the caller's transaction; nothing here commits.
pub fn reconcile(
    conn: &Connection,
    job_id: i64,
    run_id: Option<&str>,
    batch: &[Observation],
    whitelist: &HashSet<MacAddress>,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, DatabaseError> {
    let known = device_repo::load_keyed(conn, job_id)?;
    let collapsed = collapse(batch);

    let mut outcome = ReconcileOutcome {
        devices_found: collapsed.len() as u32,
        ..Default::default()
    };

    for (key, obs) in &collapsed {
        match known.get(key) {
            None => {
                let whitelisted = whitelist.contains(&obs.mac);
                device_repo::insert(
                    conn,
                    &KnownDevice {
                        job_id,
                        mac: obs.mac.clone(),
                        host: obs.host.clone(),
                        interface: obs.interface.clone(),
                        vlan: obs.vlan,
                        whitelisted,
                        first_seen: now,
                        last_seen: now,
                        status: DeviceStatus::Active,
                    },
                )?;
                outcome.new_devices += 1;
                outcome.events.push(DeviceEvent::NewDevice {
                    mac: obs.mac.clone(),
                    host: obs.host.clone(),
                    interface: obs.interface.clone(),
                    vlan: obs.vlan,
                    whitelisted,
                });
            }
            Some(device) => {
                if device.interface != obs.interface {
                    outcome.events.push(DeviceEvent::InterfaceMoved {
                        mac: obs.mac.clone(),
                        host: obs.host.clone(),
                        old_interface: device.interface.clone(),
                        new_interface: obs.interface.clone(),
                        vlan: obs.vlan,
                    });
                }
                device_repo::record_sighting(conn, job_id, key, &obs.interface, obs.vlan, now)?;
            }
        }
    }

    for obs in batch {
        device_repo::append_history(
            conn,
            &DeviceHistoryEntry {
                job_id,
                run_id: run_id.map(str::to_string),
                mac: obs.mac.clone(),
                host: obs.host.clone(),
                interface: obs.interface.clone(),
                vlan: obs.vlan,
                observed_at: obs.observed_at,
            },
        )?;
    }

    let seen: HashSet<&DeviceKey> = collapsed.iter().map(|(key, _)| key).collect();
    for (key, device) in &known {
        if device.status == DeviceStatus::Active && !seen.contains(key) {
            device_repo::mark_inactive(conn, job_id, key)?;
            outcome.marked_inactive += 1;
        }
    }

    tracing::debug!(
        job_id,
        devices_found = outcome.devices_found,
        new_devices = outcome.new_devices,
        marked_inactive = outcome.marked_inactive,
        "Reconciled batch"
    );

    Ok(outcome)
}
