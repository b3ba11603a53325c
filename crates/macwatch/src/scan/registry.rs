//! In-process registry of running jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::db::{job_repo, Database};
use crate::error::ScanError;
use crate::model::{timestamp_now, JobStatus};

/// A run currently holding its job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningJob {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

/// At most one entry per job id. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    runs: Arc<Mutex<HashMap<i64, RunningJob>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, RunningJob>> {
        // The map stays consistent even if a holder panicked.
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claims `job_id` for a run. The claim lasts until the returned guard
    /// is dropped.
    pub fn try_acquire(&self, job_id: i64, run: RunningJob) -> Result<RunGuard, ScanError> {
        let mut runs = self.lock();
        if runs.contains_key(&job_id) {
            return Err(ScanError::AlreadyRunning { job_id });
        }
        runs.insert(job_id, run);
        Ok(RunGuard {
            registry: self.clone(),
            job_id,
            restore: None,
        })
    }

    pub fn is_running(&self, job_id: i64) -> bool {
        self.lock().contains_key(&job_id)
    }

    pub fn get(&self, job_id: i64) -> Option<RunningJob> {
        self.lock().get(&job_id).cloned()
    }

    /// Ids of the jobs currently running, ascending.
    pub fn running_jobs(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn release(&self, job_id: i64) {
        self.lock().remove(&job_id);
    }
}

/// Releases a registry claim on drop. Once armed with
/// [`RunGuard::restore_job_on_drop`], it also returns the job to `active`
/// before releasing the claim.
pub struct RunGuard {
    registry: RunRegistry,
    job_id: i64,
    restore: Option<Database>,
}

impl RunGuard {
    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub fn restore_job_on_drop(&mut self, db: Database) {
        self.restore = Some(db);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(db) = self.restore.take() {
            let job_id = self.job_id;
            let result = db.with_conn(|conn| {
                job_repo::update_status(conn, job_id, JobStatus::Active, timestamp_now())
            });
            if let Err(e) = result {
                tracing::error!(job_id, error = %e, "Failed to restore job status");
            }
        }
        self.registry.release(self.job_id);
    }
}
