//! Tracing setup.
//!
//! Two sinks: a compact stderr layer for the operator and a plain-text file
//! `simops.log` in the campaign log directory. `RUST_LOG` overrides the stderr
//! level; the file always records `info` and above.

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Name of the orchestrator's own log file inside the log directory.
pub const LOG_FILE: &str = "simops.log";

/// Default stderr filter for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "simops=info" } else { "warn" }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// the file writer flushes.
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .with_filter(stderr_filter),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::INFO),
        )
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "simops=info");
    }
}
