use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use macwatch::{
    load_config, logging, ConfigError, Database, EngineConfig, MacwatchError, Orchestrator,
    SshTransport,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan one job now
    Run {
        job_id: i64,
    },
    /// Scan every active job, one after another
    RunAll,
    /// Fail runs left behind by a crashed process and free their jobs
    Recover,
}

#[tokio::main]
async fn main() -> macwatch::Result<()> {
    let args = Args::parse();

    logging::init(args.json_logs)?;

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    let db_path = args
        .database
        .clone()
        .or_else(|| config.resolved_database_path())
        .ok_or_else(|| ConfigError::Validation {
            message: "Could not determine a database path; pass --database".to_string(),
        })?;
    let db = Database::open(&db_path)?;

    let transport = Arc::new(SshTransport::new(config.clone()));
    let orchestrator = Orchestrator::new(db, transport, config);

    match args.command {
        Command::Run { job_id } => {
            let summary = orchestrator.run_job(job_id).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::RunAll => {
            let outcomes = orchestrator.run_all().await?;
            let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
            let report: Vec<_> = outcomes
                .iter()
                .map(|(job_id, outcome)| match outcome {
                    Ok(summary) => json!({ "job_id": job_id, "summary": summary }),
                    Err(e) => json!({ "job_id": job_id, "error": e.to_string() }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if failed > 0 {
                return Err(MacwatchError::RunsFailed {
                    failed,
                    total: outcomes.len(),
                });
            }
        }
        Command::Recover => {
            let report = orchestrator.recover_interrupted_runs()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
