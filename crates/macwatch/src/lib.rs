pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod retention;
pub mod scan;

pub use config::{load_config, EngineConfig};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, HostFailure, MacwatchError, ParseError, Result, ScanError, TransportError};
pub use model::{DeviceEvent, DeviceKey, Job, KnownDevice, MacAddress, Notification, Observation};
pub use reconcile::ReconcileOutcome;
pub use scan::{JobRunSummary, Orchestrator, RecoveryReport, SshTransport, TableTransport};
