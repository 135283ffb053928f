//! Tracing subscriber setup.
//!
//! The terminal belongs to the popup, so logs always go to a file. Filtering
//! comes from `LIGHTHOUSE_LOG`, then `RUST_LOG`, then defaults to `info`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "LIGHTHOUSE_LOG";

/// Installs the global subscriber writing to `log_path`.
///
/// The returned guard flushes buffered lines when dropped; keep it alive until
/// the process exits.
///
/// # Errors
/// Fails when the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init(log_path: &Path) -> Result<WorkerGuard> {
    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = log_path
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", log_path.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    build_subscriber(writer, env_filter())
        .try_init()
        .context("Failed to install tracing subscriber")?;
    tracing::debug!(path = %log_path.display(), "logging initialized");
    Ok(guard)
}

/// Filter from `LIGHTHOUSE_LOG`, falling back to `RUST_LOG`, then `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Subscriber shared by production and tests.
pub fn build_subscriber<W>(writer: W, filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer().with_writer(writer).with_ansi(false);
    tracing_subscriber::registry().with(filter).with(fmt_layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_events_at_or_above_filter() {
        let log_file = NamedTempFile::new().unwrap();
        let writer = Arc::new(log_file.reopen().unwrap());
        let subscriber = build_subscriber(writer, EnvFilter::new("info"));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(count = 3, "published results");
            tracing::debug!("hidden detail");
        });

        let contents = fs::read_to_string(log_file.path()).unwrap();
        assert!(contents.contains("published results"));
        assert!(contents.contains("count=3"));
        assert!(!contents.contains("hidden detail"));
        assert!(!contents.contains('\u{1b}'), "log file must not contain ANSI codes");
    }

    #[test]
    fn target_directives_narrow_output() {
        let log_file = NamedTempFile::new().unwrap();
        let writer = Arc::new(log_file.reopen().unwrap());
        let subscriber = build_subscriber(writer, EnvFilter::new("warn,lighthouse::child=debug"));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "lighthouse::child", "child said hi");
            tracing::info!(target: "other", "not shown");
        });

        let contents = fs::read_to_string(log_file.path()).unwrap();
        assert!(contents.contains("child said hi"));
        assert!(!contents.contains("not shown"));
    }
}
