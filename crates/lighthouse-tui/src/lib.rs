//! Terminal front end of the lighthouse launcher.

pub mod effects;
pub mod events;
pub mod measure;
pub mod query;
pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod update;

use std::io::{IsTerminal, stderr};

use anyhow::Result;
use lighthouse_core::config::Config;
use lighthouse_core::pipeline::PipelineEvent;
use lighthouse_core::store::SharedResults;
pub use runtime::PopupRuntime;
use tokio::sync::mpsc;

use crate::state::{AppState, PopupSettings};

/// Shows the popup until the user picks an action or cancels.
///
/// `results` is fed by the reader task, which also sends notifications on
/// `inbox`. Queries typed by the user go out on `queries`.
///
/// # Errors
/// Fails when stderr is not a terminal or terminal I/O fails.
pub fn run_popup(
    config: &Config,
    results: SharedResults,
    inbox: mpsc::Receiver<PipelineEvent>,
    queries: mpsc::UnboundedSender<String>,
) -> Result<Option<String>> {
    if !stderr().is_terminal() {
        anyhow::bail!("lighthouse needs a terminal on stderr to draw the popup");
    }

    let settings = PopupSettings::from_config(config);
    let state = AppState::new(settings, results);
    PopupRuntime::new(state, inbox, queries)?.run()
}
