//! Domain types shared by the parser, reconciler, notifier and repositories.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub mod mac;

pub use mac::MacAddress;

/// Current time at the precision timestamps are stored with.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// VLAN identifier as reported by the switch. Any integer token is
/// accepted; range checks are left to the switch.
pub type VlanId = i64;

// ─── Job ────────────────────────────────────────────────────────────────────

/// Lifecycle status of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Running,
    Disabled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Running => "running",
            JobStatus::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "running" => Ok(JobStatus::Running),
            "disabled" => Ok(JobStatus::Disabled),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// How long inactive inventory records are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "days")]
pub enum RetentionPolicy {
    #[default]
    Forever,
    Days(u32),
    RemoveImmediately,
}

/// Per-job notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Master switch; when off no notification is produced.
    pub enabled: bool,
    /// New whitelisted device seen.
    pub new_macs: bool,
    /// New device that is not on the whitelist.
    pub unauthorized_macs: bool,
    /// Known device seen on a different interface.
    pub interface_moves: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            new_macs: true,
            unauthorized_macs: true,
            interface_moves: true,
        }
    }
}

/// A scan target set: a group of switches sharing a whitelist and policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    /// Restricts the table query to one VLAN when set.
    pub vlan_filter: Option<VlanId>,
    pub notifications: NotificationSettings,
    pub retention: RetentionPolicy,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Host ───────────────────────────────────────────────────────────────────

/// A switch queried by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: i64,
    pub job_id: i64,
    /// Display name; recorded as the host of every observation.
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
    pub enabled: bool,
}

impl Host {
    pub fn connection(&self) -> HostConnection {
        HostConnection {
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }
}

/// Connection parameters handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConnection {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
}

// ─── Devices ────────────────────────────────────────────────────────────────

/// One line of evidence that a MAC was seen on a host interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub mac: MacAddress,
    pub vlan: VlanId,
    pub interface: String,
    pub host: String,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn key(&self) -> DeviceKey {
        DeviceKey {
            mac: self.mac.clone(),
            host: self.host.clone(),
        }
    }
}

/// Identity of an inventory record within a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub mac: MacAddress,
    pub host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeviceStatus::Active),
            "inactive" => Ok(DeviceStatus::Inactive),
            _ => Err(format!("Unknown device status: {}", s)),
        }
    }
}

/// Persistent inventory record of a device's last-known presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownDevice {
    pub job_id: i64,
    pub mac: MacAddress,
    pub host: String,
    pub interface: String,
    pub vlan: VlanId,
    pub whitelisted: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: DeviceStatus,
}

impl KnownDevice {
    pub fn key(&self) -> DeviceKey {
        DeviceKey {
            mac: self.mac.clone(),
            host: self.host.clone(),
        }
    }
}

/// Append-only audit record of a single observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHistoryEntry {
    pub job_id: i64,
    pub run_id: Option<String>,
    pub mac: MacAddress,
    pub host: String,
    pub interface: String,
    pub vlan: VlanId,
    pub observed_at: DateTime<Utc>,
}

/// Change detected while reconciling a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DeviceEvent {
    NewDevice {
        mac: MacAddress,
        host: String,
        interface: String,
        vlan: VlanId,
        whitelisted: bool,
    },
    InterfaceMoved {
        mac: MacAddress,
        host: String,
        old_interface: String,
        new_interface: String,
        vlan: VlanId,
    },
}

// ─── Notifications ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Informational,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Informational => "informational",
            NotificationKind::Warning => "warning",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "informational" => Ok(NotificationKind::Informational),
            "warning" => Ok(NotificationKind::Warning),
            _ => Err(format!("Unknown notification kind: {}", s)),
        }
    }
}

/// User-facing alert. Immutable apart from `read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub job_id: i64,
    pub job_name: String,
    pub kind: NotificationKind,
    pub message: String,
    pub mac: MacAddress,
    pub host: String,
    pub interface: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// ─── Runs ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// Summary of one execution of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: String,
    pub job_id: i64,
    pub status: RunStatus,
    pub hosts_scanned: u32,
    pub devices_found: u32,
    pub new_devices: u32,
    pub warnings: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Diagnostic lines collected while the run executed.
    pub log: Vec<String>,
}

impl JobRun {
    /// A fresh run in `running` state.
    pub fn start(job_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id,
            status: RunStatus::Running,
            hosts_scanned: 0,
            devices_found: 0,
            new_devices: 0,
            warnings: 0,
            started_at,
            finished_at: None,
            error: None,
            log: Vec::new(),
        }
    }
}
