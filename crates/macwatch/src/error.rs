use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MacwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{failed} of {total} job runs failed")]
    RunsFailed { failed: usize, total: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Errors returned by a job run. Per-host problems never surface here;
/// they are recorded as run diagnostics.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Job {job_id} is already running")]
    AlreadyRunning { job_id: i64 },

    #[error("Job {0} not found or not active")]
    JobNotFound(i64),

    #[error("Job {0} has no enabled hosts")]
    NoEnabledHosts(i64),

    #[error("All hosts of job {job_id} failed: {message}")]
    AllHostsFailed { job_id: i64, message: String },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty table output from host '{host}'")]
    EmptyOutput { host: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("Output is not valid UTF-8")]
    InvalidOutput,
}

/// Why a single host produced no observations.
#[derive(Error, Debug)]
pub enum HostFailure {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Run deadline reached before the host answered")]
    Deadline,
}

pub type Result<T> = std::result::Result<T, MacwatchError>;
