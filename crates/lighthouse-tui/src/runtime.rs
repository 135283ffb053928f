//! Popup runtime: owns the terminal, runs the event loop, executes effects.
//!
//! This is the Elm runtime boundary. The reducer in [`crate::update`] stays
//! pure; every side effect happens here.
//!
//! Pipeline notifications arrive on a bounded inbox that is drained with
//! `try_recv` each iteration, next to a timed poll of terminal input.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use lighthouse_core::interrupt;
use lighthouse_core::pipeline::PipelineEvent;
use ratatui::layout::Size;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::measure::CellMeasurer;
use crate::state::AppState;
use crate::terminal::{self, PopupTerminal};
use crate::{render, update};

/// Poll interval while the user is typing or results are arriving.
pub const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Poll interval when nothing has happened for a while.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

/// Full-screen popup runtime.
pub struct PopupRuntime {
    terminal: PopupTerminal,
    pub state: AppState,
    measurer: CellMeasurer,
    inbox: mpsc::Receiver<PipelineEvent>,
    inbox_open: bool,
    queries: mpsc::UnboundedSender<String>,
    last_size: Option<Size>,
    last_tick: Instant,
    last_activity: Instant,
}

impl PopupRuntime {
    /// Switches the terminal into popup mode.
    ///
    /// # Errors
    /// Fails when the terminal cannot be set up.
    pub fn new(
        state: AppState,
        inbox: mpsc::Receiver<PipelineEvent>,
        queries: mpsc::UnboundedSender<String>,
    ) -> Result<Self> {
        terminal::install_panic_hook();
        interrupt::set_restore_hook(|| {
            let _ = terminal::restore_terminal();
        });

        // Measure cells before raw mode takes over the terminal.
        let measurer = CellMeasurer::detect();
        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;

        let now = Instant::now();
        Ok(Self {
            terminal,
            state,
            measurer,
            inbox,
            inbox_open: true,
            queries,
            last_size: None,
            last_tick: now,
            last_activity: now,
        })
    }

    /// Runs until the user commits, cancels, or a terminate signal arrives.
    /// Returns the committed action, if any.
    ///
    /// # Errors
    /// Fails on terminal I/O errors.
    pub fn run(mut self) -> Result<Option<String>> {
        self.event_loop()?;
        Ok(self.state.committed.take())
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.should_quit {
            if interrupt::should_terminate() {
                tracing::info!("terminate signal received");
                self.state.should_quit = true;
                break;
            }

            let mut events = self.collect_events()?;

            let size = self.terminal.size()?;
            if self.last_size != Some(size) {
                self.last_size = Some(size);
                events.insert(
                    0,
                    UiEvent::Frame {
                        width: size.width,
                        height: size.height,
                    },
                );
            }

            for event in events {
                if !matches!(event, UiEvent::Tick) {
                    dirty = true;
                    self.last_activity = Instant::now();
                }
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
            }

            if dirty && !self.state.should_quit {
                self.terminal
                    .draw(|frame| render::render(&self.state, frame, &self.measurer))?;
                dirty = false;
            }
        }

        Ok(())
    }

    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();
        self.collect_inbox_events(&mut events);

        let tick_interval = if self.last_activity.elapsed() < IDLE_POLL_DURATION {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };
        let poll_duration = if events.is_empty() {
            tick_interval.saturating_sub(self.last_tick.elapsed())
        } else {
            Duration::ZERO
        };

        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= tick_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    /// Drains pipeline notifications without blocking.
    fn collect_inbox_events(&mut self, events: &mut Vec<UiEvent>) {
        while self.inbox_open {
            match self.inbox.try_recv() {
                Ok(event) => events.push(UiEvent::Pipeline(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.inbox_open = false,
            }
        }
    }

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            match effect {
                UiEffect::SendQuery { text } => {
                    if self.queries.send(text).is_err() {
                        tracing::debug!("query dropped, child writer is gone");
                    }
                }
                UiEffect::Commit { action } => {
                    tracing::info!(%action, "action chosen");
                    self.state.committed = Some(action);
                    self.state.should_quit = true;
                }
                UiEffect::Quit => self.state.should_quit = true,
            }
        }
    }
}

impl Drop for PopupRuntime {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}
