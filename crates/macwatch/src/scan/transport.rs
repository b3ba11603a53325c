//! Remote command execution seam.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;

use crate::config::EngineConfig;
use crate::error::TransportError;
use crate::model::{HostConnection, VlanId};

/// Fetches the raw MAC address table of one host.
///
/// Implementations do not enforce the host timeout themselves; the
/// orchestrator bounds every call and drops the future when it expires.
#[async_trait]
pub trait TableTransport: Send + Sync {
    async fn query_table(
        &self,
        host: &HostConnection,
        vlan_filter: Option<VlanId>,
    ) -> Result<String, TransportError>;
}

/// Runs the table command through the system `ssh` client in batch mode.
///
/// Authentication is left to the operator's agent and keys; the client
/// never prompts.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: EngineConfig,
}

impl SshTransport {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Arguments passed to the ssh binary for one host.
    fn build_args(&self, host: &HostConnection, vlan_filter: Option<VlanId>) -> Vec<String> {
        let destination = match host
            .username
            .as_deref()
            .or(self.config.ssh.default_username.as_deref())
        {
            Some(user) => format!("{}@{}", user, host.address),
            None => host.address.clone(),
        };

        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.ssh.connect_timeout_secs),
            "-p".to_string(),
            host.port.to_string(),
            destination,
            self.config.table_command_for(vlan_filter),
        ]
    }
}

#[async_trait]
impl TableTransport for SshTransport {
    async fn query_table(
        &self,
        host: &HostConnection,
        vlan_filter: Option<VlanId>,
    ) -> Result<String, TransportError> {
        let args = self.build_args(host, vlan_filter);
        tracing::debug!(host = %host.name, address = %host.address, "Querying MAC table over ssh");

        let output = TokioCommand::new(&self.config.ssh.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransportError::Spawn {
                program: self.config.ssh.binary.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(TransportError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| TransportError::InvalidOutput)
    }
}
