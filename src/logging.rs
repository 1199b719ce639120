//! Tracing setup.
//!
//! Human-readable logs always go to stderr; stdout belongs to the MCP
//! transport. With debug on, a plain-text copy is also written to
//! `~/.roundtable/logs/roundtable-mcp.log`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::availability::state_dir;

pub const LOG_FILE_NAME: &str = "roundtable-mcp.log";

/// Keeps the background log writer alive; flushes on drop.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Default log directory, if a home directory exists.
pub fn default_log_dir() -> Option<PathBuf> {
    state_dir().map(|d| d.join("logs"))
}

/// `RUST_LOG` wins; otherwise `debug` or `info`.
fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a subscriber
/// is already installed.
pub fn init(debug: bool, log_dir: Option<&Path>) -> Result<LoggingGuard> {
    let (file_layer, guard) = match log_dir.filter(|_| debug) {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter(debug))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    let debug_enabled = debug;
    tracing::debug!(debug_enabled, log_dir = ?log_dir, "logging initialized");
    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir_under_state_dir() {
        if let Some(dir) = default_log_dir() {
            assert!(dir.ends_with(".roundtable/logs"));
        }
    }
}
