//! Default command: run the child, show the popup, print the chosen action.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lighthouse_core::child::{self, ChildProcess};
use lighthouse_core::config::Config;
use lighthouse_core::store::ResultStore;
use lighthouse_core::{interrupt, logging, pipeline};
use tokio::sync::mpsc;

/// Pipeline notifications buffered for the foreground.
const PIPELINE_CAPACITY: usize = 16;

/// How long shutdown waits for each background task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Exit code when the popup is dismissed without choosing anything.
const EXIT_CANCELLED: i32 = 1;

pub fn run(config: &Config) -> Result<i32> {
    let _log_guard = logging::init(&config.log_path())?;
    interrupt::init()?;

    // one tokio runtime for the child plumbing; the popup runs on this thread
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    let store = ResultStore::shared(usize::from(config.max_results));
    let (events_tx, events_rx) = mpsc::channel(PIPELINE_CAPACITY);
    let (child, reader, queries, writer_task) = rt.block_on(async {
        let (child, writer, stdout) = ChildProcess::spawn(&config.cmd)?;
        let reader = pipeline::spawn_reader(
            stdout,
            Arc::clone(&store),
            events_tx,
            config.max_message_bytes,
        );
        let (queries, writer_task) = child::spawn_query_writer(writer);
        anyhow::Ok((child, reader, queries, writer_task))
    })?;

    let outcome = lighthouse_tui::run_popup(config, store, events_rx, queries);

    rt.block_on(async {
        tracing::debug!(pid = ?child.id(), command = child.command(), "stopping child");
        if let Err(err) = child.shutdown().await {
            tracing::warn!(err = format!("{err:#}"), "child shutdown failed");
        }
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, writer_task).await.is_err() {
            tracing::warn!("query writer did not stop in time");
        }
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, reader).await {
            Ok(Ok(exit)) => tracing::debug!(%exit, "reader finished"),
            Ok(Err(err)) => tracing::warn!(%err, "reader task failed"),
            Err(_) => tracing::warn!("reader did not stop in time"),
        }
    });

    match outcome? {
        Some(action) => {
            println!("{action}");
            Ok(0)
        }
        None => {
            tracing::info!("dismissed without a choice");
            Ok(EXIT_CANCELLED)
        }
    }
}
