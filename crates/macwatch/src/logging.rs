//! Tracing subscriber setup for the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{MacwatchError, Result};

/// Installs the global subscriber. `RUST_LOG` overrides the default
/// `info` filter. Records from the `log` facade are forwarded as well.
///
/// Fails if a global subscriber or logger is already installed.
pub fn init(json: bool) -> Result<()> {
    tracing_log::LogTracer::init().map_err(|e| MacwatchError::Logging(e.to_string()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| MacwatchError::Logging(e.to_string()))?;
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| MacwatchError::Logging(e.to_string()))?;
    }
    Ok(())
}
