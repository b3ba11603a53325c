//! Test harness for isolated orchestrator runs.
//!
//! The `TestHarness` struct provides:
//! - A temporary database file with all migrations applied
//! - A `ScriptedTransport` answering per host name
//! - Query helpers for inspecting what a run stored

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use macwatch::db::{device_repo, job_repo, notification_repo, run_repo};
use macwatch::model::{HostConnection, Job, JobRun, KnownDevice, Notification, VlanId};
use macwatch::{Database, EngineConfig, Orchestrator, TableTransport, TransportError};

/// How the scripted transport answers a host.
#[derive(Clone)]
pub enum Response {
    /// Returns the given table output.
    Output(String),
    /// Fails as if the remote command exited non-zero.
    Fail(String),
    /// Never answers.
    Hang,
    /// Waits for the gate to open, then returns the output.
    Gated(Arc<Notify>, String),
}

/// In-memory transport answering from a per-host script.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<(String, Option<VlanId>)>>,
}

impl ScriptedTransport {
    pub fn set(&self, host: &str, response: Response) {
        self.responses
            .lock()
            .unwrap()
            .insert(host.to_string(), response);
    }

    /// Every query made so far, as (host name, VLAN filter).
    pub fn calls(&self) -> Vec<(String, Option<VlanId>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableTransport for ScriptedTransport {
    async fn query_table(
        &self,
        host: &HostConnection,
        vlan_filter: Option<VlanId>,
    ) -> Result<String, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((host.name.clone(), vlan_filter));

        let response = self.responses.lock().unwrap().get(&host.name).cloned();
        match response {
            Some(Response::Output(raw)) => Ok(raw),
            Some(Response::Fail(stderr)) => Err(TransportError::CommandFailed {
                status: "exit status: 255".to_string(),
                stderr,
            }),
            Some(Response::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(Response::Gated(gate, raw)) => {
                gate.notified().await;
                Ok(raw)
            }
            None => Err(TransportError::CommandFailed {
                status: "exit status: 255".to_string(),
                stderr: format!("ssh: Could not resolve hostname {}", host.address),
            }),
        }
    }
}

/// Test harness providing an isolated orchestrator for integration tests.
pub struct TestHarness {
    /// Temporary directory holding the database file.
    temp_dir: TempDir,
    pub db: Database,
    pub transport: Arc<ScriptedTransport>,
    pub orchestrator: Arc<Orchestrator>,
}

impl TestHarness {
    /// Create a harness with the default engine configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("macwatch.db"))
            .expect("Failed to open test database");
        let transport = Arc::new(ScriptedTransport::default());
        let orchestrator = Arc::new(Orchestrator::new(
            db.clone(),
            transport.clone(),
            config,
        ));
        Self {
            temp_dir,
            db,
            transport,
            orchestrator,
        }
    }

    pub fn job(&self, job_id: i64) -> Job {
        self.db
            .with_conn(|conn| job_repo::find_by_id(conn, job_id))
            .unwrap()
            .expect("job exists")
    }

    pub fn devices(&self, job_id: i64) -> Vec<KnownDevice> {
        self.db
            .with_conn(|conn| device_repo::list_for_job(conn, job_id))
            .unwrap()
    }

    pub fn notifications(&self, job_id: i64) -> Vec<Notification> {
        self.db
            .with_conn(|conn| notification_repo::list_for_job(conn, job_id))
            .unwrap()
    }

    /// Runs of a job, newest first.
    pub fn runs(&self, job_id: i64) -> Vec<JobRun> {
        self.db
            .with_conn(|conn| run_repo::list_for_job(conn, job_id))
            .unwrap()
    }

    pub fn history_count(&self, job_id: i64) -> u32 {
        self.db
            .with_conn(|conn| device_repo::count_history(conn, job_id))
            .unwrap()
    }
}
