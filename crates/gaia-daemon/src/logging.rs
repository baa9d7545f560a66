//! Audit logging setup.
//!
//! When running as a daemon, every event is appended to `gaia_audit.log`
//! under the data directory as one JSON line, alongside a human-readable
//! stderr stream. Tools log to stderr only.

use std::fs::OpenOptions;
use std::path::Path;

use gaia_core::GaiaError;
use gaia_core::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the daemon subscriber: JSON lines to the audit log plus plain
/// text on stderr. The returned guard must be held for the process
/// lifetime or buffered events are lost.
pub fn init_daemon_logging(audit_log_path: &Path) -> Result<WorkerGuard> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_log_path)
        .map_err(|e| GaiaError::Config {
            reason: format!("could not open audit log '{}': {e}", audit_log_path.display()),
        })?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}

/// Install the plain stderr subscriber used by the CLI tools.
pub fn init_tool_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
