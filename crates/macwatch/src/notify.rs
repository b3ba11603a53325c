//! Turns reconciliation events into notification records.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{DeviceEvent, Job, MacAddress, Notification, NotificationKind, VlanId};

fn build(
    job: &Job,
    kind: NotificationKind,
    message: String,
    mac: &MacAddress,
    host: &str,
    interface: &str,
    now: DateTime<Utc>,
) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        job_id: job.id,
        job_name: job.name.clone(),
        kind,
        message,
        mac: mac.clone(),
        host: host.to_string(),
        interface: interface.to_string(),
        read: false,
        created_at: now,
    }
}

fn new_device_message(
    whitelisted: bool,
    mac: &MacAddress,
    host: &str,
    interface: &str,
    vlan: VlanId,
) -> String {
    if whitelisted {
        format!(
            "New authorized device {} on {} {} (VLAN {})",
            mac, host, interface, vlan
        )
    } else {
        format!(
            "Unauthorized device {} detected on {} {} (VLAN {})",
            mac, host, interface, vlan
        )
    }
}

/// Builds the notifications `job` asks for. Pure: nothing is stored.
pub fn notify(job: &Job, events: &[DeviceEvent], now: DateTime<Utc>) -> Vec<Notification> {
    let prefs = &job.notifications;
    if !prefs.enabled {
        return Vec::new();
    }

    let mut notifications = Vec::new();
    for event in events {
        match event {
            DeviceEvent::NewDevice {
                mac,
                host,
                interface,
                vlan,
                whitelisted,
            } => {
                let kind = match (*whitelisted, prefs.new_macs, prefs.unauthorized_macs) {
                    (true, true, _) => NotificationKind::Informational,
                    (false, _, true) => NotificationKind::Warning,
                    _ => continue,
                };
                let message = new_device_message(*whitelisted, mac, host, interface, *vlan);
                notifications.push(build(job, kind, message, mac, host, interface, now));
            }
            DeviceEvent::InterfaceMoved {
                mac,
                host,
                old_interface,
                new_interface,
                ..
            } => {
                if !prefs.interface_moves {
                    continue;
                }
                let message = format!(
                    "Device {} on {} moved from {} to {}",
                    mac, host, old_interface, new_interface
                );
                notifications.push(build(
                    job,
                    NotificationKind::Informational,
                    message,
                    mac,
                    host,
                    new_interface,
                    now,
                ));
            }
        }
    }
    notifications
}

/// Number of warnings, as counted on the job run.
pub fn warning_count(notifications: &[Notification]) -> u32 {
    notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::Warning)
        .count() as u32
}
