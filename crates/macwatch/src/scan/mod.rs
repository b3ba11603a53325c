//! Scanning: transport seam, table parsing and job runs.

pub mod orchestrator;
pub mod parser;
pub mod registry;
pub mod transport;

pub use orchestrator::{JobRunSummary, Orchestrator, RecoveryReport};
pub use registry::{RunGuard, RunRegistry, RunningJob};
pub use transport::{SshTransport, TableTransport};
