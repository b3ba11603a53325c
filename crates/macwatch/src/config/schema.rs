use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::VlanId;

/// Engine configuration. Every field has a default, so `{}` is a valid
/// configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Database file. Falls back to `~/.macwatch/data/macwatch.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_host_timeout_secs")]
    pub host_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_hosts")]
    pub max_concurrent_hosts: usize,
    /// Upper bound for the whole host-scan phase of a run.
    #[serde(default)]
    pub run_deadline_secs: Option<u64>,
    #[serde(default = "default_table_command")]
    pub table_command: String,
    /// Appended to `table_command` when the job has a VLAN filter.
    #[serde(default = "default_vlan_filter_template")]
    pub vlan_filter_template: String,
    #[serde(default)]
    pub ssh: SshConfig,
}

fn default_host_timeout_secs() -> u64 {
    45
}

fn default_max_concurrent_hosts() -> usize {
    4
}

fn default_table_command() -> String {
    "show mac address-table".to_string()
}

fn default_vlan_filter_template() -> String {
    " vlan {vlan}".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            host_timeout_secs: default_host_timeout_secs(),
            max_concurrent_hosts: default_max_concurrent_hosts(),
            run_deadline_secs: None,
            table_command: default_table_command(),
            vlan_filter_template: default_vlan_filter_template(),
            ssh: SshConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn host_timeout(&self) -> Duration {
        Duration::from_secs(self.host_timeout_secs)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }

    /// The configured database path, or the per-user default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }

    /// The remote command for a scan, with the VLAN filter applied.
    pub fn table_command_for(&self, vlan_filter: Option<VlanId>) -> String {
        match vlan_filter {
            Some(vlan) => format!(
                "{}{}",
                self.table_command,
                self.vlan_filter_template
                    .replace("{vlan}", &vlan.to_string())
            ),
            None => self.table_command.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_binary")]
    pub binary: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Used for hosts that carry no username of their own.
    #[serde(default)]
    pub default_username: Option<String>,
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            binary: default_ssh_binary(),
            connect_timeout_secs: default_connect_timeout_secs(),
            default_username: None,
        }
    }
}
