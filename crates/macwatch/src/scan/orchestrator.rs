//! Job runs: host scans, reconciliation and run bookkeeping.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info_span, Instrument};

use super::parser;
use super::registry::{RunRegistry, RunningJob};
use super::transport::TableTransport;
use crate::config::EngineConfig;
use crate::db::{host_repo, job_repo, notification_repo, run_repo, Database, DatabaseError};
use crate::error::{HostFailure, ScanError, TransportError};
use crate::model::{timestamp_now, Host, Job, JobRun, JobStatus, Observation, RunStatus, VlanId};
use crate::{notify, reconcile, retention};

/// Error recorded on runs left `running` by a process that died.
const INTERRUPTED_MESSAGE: &str = "Run interrupted before completion";

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRunSummary {
    pub run_id: String,
    pub job_id: i64,
    pub hosts_scanned: u32,
    pub hosts_failed: u32,
    pub devices_found: u32,
    pub new_devices: u32,
    pub warnings: u32,
    pub devices_pruned: u32,
    /// One line per failed host.
    pub log: Vec<String>,
}

/// Counts from [`Orchestrator::recover_interrupted_runs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub runs_failed: usize,
    pub jobs_reset: usize,
}

/// Outcome of one host query.
struct HostScan {
    host: String,
    result: Result<Vec<Observation>, HostFailure>,
}

/// Drives job runs against a transport and the database.
///
/// Cheap to share behind an `Arc`; runs of different jobs may proceed
/// concurrently, a second run of the same job is refused.
pub struct Orchestrator {
    db: Database,
    transport: Arc<dyn TableTransport>,
    config: EngineConfig,
    registry: RunRegistry,
}

impl Orchestrator {
    pub fn new(db: Database, transport: Arc<dyn TableTransport>, config: EngineConfig) -> Self {
        Self {
            db,
            transport,
            config,
            registry: RunRegistry::new(),
        }
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Runs one scan of `job_id` end to end.
    pub async fn run_job(&self, job_id: i64) -> Result<JobRunSummary, ScanError> {
        let mut run = JobRun::start(job_id, timestamp_now());
        let mut guard = self.registry.try_acquire(
            job_id,
            RunningJob {
                run_id: run.id.clone(),
                started_at: run.started_at,
            },
        )?;

        let (job, hosts) = self.load_runnable(job_id)?;

        let claimed = self.db.transaction(|tx| {
            if !job_repo::claim_for_run(tx, job_id, run.started_at)? {
                return Ok(false);
            }
            run_repo::insert(tx, &run)?;
            Ok(true)
        })?;
        if !claimed {
            return Err(ScanError::AlreadyRunning { job_id });
        }
        guard.restore_job_on_drop(self.db.clone());

        let span = info_span!("run_job", job_id, run_id = %run.id, job = %job.name);
        self.execute(&job, &hosts, &mut run).instrument(span).await
    }

    /// Scans the hosts and stores the outcome. `run` is already persisted
    /// in `running` state.
    async fn execute(
        &self,
        job: &Job,
        hosts: &[Host],
        run: &mut JobRun,
    ) -> Result<JobRunSummary, ScanError> {
        tracing::info!(hosts = hosts.len(), "Job run started");

        let scans = self.scan_hosts(hosts, job.vlan_filter).await;
        run.hosts_scanned = hosts.len() as u32;

        let mut batch = Vec::new();
        let mut hosts_failed = 0u32;
        for scan in scans {
            match scan.result {
                Ok(observations) => batch.extend(observations),
                Err(e) => {
                    hosts_failed += 1;
                    tracing::warn!(host = %scan.host, error = %e, "Host scan failed");
                    run.log.push(format!("{}: {}", scan.host, e));
                }
            }
        }

        if hosts_failed == run.hosts_scanned {
            let message = run.log.join("; ");
            run.status = RunStatus::Failed;
            run.error = Some(message.clone());
            run.finished_at = Some(timestamp_now());
            self.db.with_conn(|conn| run_repo::finalize(conn, run))?;
            tracing::error!(%message, "All hosts failed");
            return Err(ScanError::AllHostsFailed {
                job_id: job.id,
                message,
            });
        }

        let summary = match self.commit_batch(job, run, &batch) {
            Ok(summary) => summary,
            Err(e) => {
                self.finalize_failed(run, &e);
                return Err(e.into());
            }
        };

        tracing::info!(
            devices_found = summary.devices_found,
            new_devices = summary.new_devices,
            warnings = summary.warnings,
            hosts_failed,
            "Job run completed"
        );

        Ok(JobRunSummary {
            hosts_failed,
            ..summary
        })
    }

    /// Runs every active job one after another.
    pub async fn run_all(&self) -> Result<Vec<(i64, Result<JobRunSummary, ScanError>)>, ScanError> {
        let jobs = self
            .db
            .with_conn(|conn| job_repo::list_by_status(conn, JobStatus::Active))?;

        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let outcome = self.run_job(job.id).await;
            if let Err(e) = &outcome {
                tracing::warn!(job_id = job.id, error = %e, "Job run did not complete");
            }
            outcomes.push((job.id, outcome));
        }
        Ok(outcomes)
    }

    /// Fails runs and resets jobs left `running` by a previous process.
    /// Does nothing while this orchestrator has runs in flight.
    pub fn recover_interrupted_runs(&self) -> Result<RecoveryReport, ScanError> {
        let in_flight = self.registry.running_jobs();
        if !in_flight.is_empty() {
            tracing::warn!(?in_flight, "Skipping recovery while runs are in flight");
            return Ok(RecoveryReport::default());
        }

        let now = timestamp_now();
        let report = self.db.transaction(|tx| {
            Ok(RecoveryReport {
                runs_failed: run_repo::fail_interrupted(tx, INTERRUPTED_MESSAGE, now)?,
                jobs_reset: job_repo::reset_running(tx, now)?,
            })
        })?;

        if report.runs_failed > 0 || report.jobs_reset > 0 {
            tracing::info!(
                runs_failed = report.runs_failed,
                jobs_reset = report.jobs_reset,
                "Recovered interrupted runs"
            );
        }
        Ok(report)
    }

    /// Loads the job and its enabled hosts, refusing jobs that cannot run.
    fn load_runnable(&self, job_id: i64) -> Result<(Job, Vec<Host>), ScanError> {
        let (job, hosts) = self.db.with_conn(|conn| {
            let job = job_repo::find_by_id(conn, job_id)?;
            let hosts = match &job {
                Some(_) => host_repo::list_enabled(conn, job_id)?,
                None => Vec::new(),
            };
            Ok((job, hosts))
        })?;

        let job = match job {
            Some(job) if job.status == JobStatus::Active => job,
            // Left behind by another process, or by a crash before recovery.
            Some(job) if job.status == JobStatus::Running => {
                return Err(ScanError::AlreadyRunning { job_id })
            }
            _ => return Err(ScanError::JobNotFound(job_id)),
        };
        if hosts.is_empty() {
            return Err(ScanError::NoEnabledHosts(job_id));
        }
        Ok((job, hosts))
    }

    /// Queries all hosts with bounded concurrency. Results come back in
    /// host order.
    async fn scan_hosts(&self, hosts: &[Host], vlan_filter: Option<VlanId>) -> Vec<HostScan> {
        let deadline = self.run_deadline_from(Instant::now());
        let limit = self.config.max_concurrent_hosts.max(1);

        // Collected first so the run future stays `Send` for `tokio::spawn`.
        let scans: Vec<_> = hosts
            .iter()
            .map(|host| self.scan_host(host, vlan_filter, deadline))
            .collect();
        stream::iter(scans).buffered(limit).collect().await
    }

    /// Deadline for a run starting at `start`. A deadline too far away to
    /// represent means none.
    fn run_deadline_from(&self, start: Instant) -> Option<Instant> {
        self.config
            .run_deadline()
            .and_then(|deadline| start.checked_add(deadline))
    }

    async fn scan_host(
        &self,
        host: &Host,
        vlan_filter: Option<VlanId>,
        deadline: Option<Instant>,
    ) -> HostScan {
        let span = info_span!("scan_host", host = %host.name, address = %host.address);
        let result = self
            .query_host(host, vlan_filter, deadline)
            .instrument(span)
            .await;
        HostScan {
            host: host.name.clone(),
            result,
        }
    }

    async fn query_host(
        &self,
        host: &Host,
        vlan_filter: Option<VlanId>,
        deadline: Option<Instant>,
    ) -> Result<Vec<Observation>, HostFailure> {
        let connection = host.connection();
        let timeout = self.config.host_timeout();

        let query = async {
            match tokio::time::timeout(
                timeout,
                self.transport.query_table(&connection, vlan_filter),
            )
            .await
            {
                Ok(result) => result.map_err(HostFailure::from),
                Err(_) => Err(HostFailure::Transport(TransportError::Timeout(timeout))),
            }
        };

        let raw = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, query)
                .await
                .unwrap_or(Err(HostFailure::Deadline))?,
            None => query.await?,
        };

        let observations = parser::parse(&raw, &host.name)?;
        tracing::debug!(observations = observations.len(), "Host scanned");
        Ok(observations)
    }

    /// Reconciles the pooled batch, stores notifications, applies retention
    /// and finalizes the run, all in one transaction.
    fn commit_batch(
        &self,
        job: &Job,
        run: &JobRun,
        batch: &[Observation],
    ) -> Result<JobRunSummary, DatabaseError> {
        let now = timestamp_now();
        self.db.transaction(|tx| {
            let whitelist = job_repo::whitelist(tx, job.id)?;
            let outcome = reconcile::reconcile(tx, job.id, Some(run.id.as_str()), batch, &whitelist, now)?;

            let notifications = notify::notify(job, &outcome.events, now);
            for n in &notifications {
                notification_repo::insert(tx, n)?;
            }

            let pruned = retention::enforce(tx, job.id, job.retention, now)?;

            let mut done = run.clone();
            done.status = RunStatus::Completed;
            done.devices_found = outcome.devices_found;
            done.new_devices = outcome.new_devices;
            done.warnings = notify::warning_count(&notifications);
            done.finished_at = Some(now);
            run_repo::finalize(tx, &done)?;

            Ok(JobRunSummary {
                run_id: done.id,
                job_id: job.id,
                hosts_scanned: done.hosts_scanned,
                hosts_failed: 0,
                devices_found: done.devices_found,
                new_devices: done.new_devices,
                warnings: done.warnings,
                devices_pruned: pruned as u32,
                log: done.log,
            })
        })
    }

    /// Best-effort failure record after the run transaction rolled back.
    fn finalize_failed(&self, run: &mut JobRun, error: &DatabaseError) {
        run.status = RunStatus::Failed;
        run.error = Some(error.to_string());
        run.finished_at = Some(timestamp_now());
        tracing::error!(error = %error, "Job run failed while storing results");
        if let Err(e) = self.db.with_conn(|conn| run_repo::finalize(conn, run)) {
            tracing::error!(error = %e, "Failed to record failed run");
        }
    }
}
