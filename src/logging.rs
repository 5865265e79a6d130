//! Subscriber setup for the command-line runner.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::{fmt, EnvFilter};

use crate::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// When logging to a file the returned guard must stay alive until the run ends, or
/// buffered lines are lost.
pub fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level = logging.level().unwrap_or(Level::INFO);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let Some(path) = logging.file.as_deref() else {
        let builder = fmt::Subscriber::builder().with_env_filter(filter);
        // Ignore error if a global subscriber is already set (e.g., when running in tests)
        let _ = if logging.json {
            tracing::subscriber::set_global_default(builder.json().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };
        return Ok(None);
    };

    let file = create_log_file(path)?;
    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file);
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer);
    let _ = if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    Ok(Some(guard))
}

fn create_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory at {}", dir.display()))?;
    }
    File::create(path).with_context(|| format!("creating log file at {}", path.display()))
}
