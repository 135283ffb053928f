//! Reducer: applies a [`UiEvent`] to [`AppState`] and returns effects.
//!
//! No I/O happens here. Navigation goes through the shared store, which only
//! takes its own short lock.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use lighthouse_core::pipeline::PipelineEvent;
use lighthouse_core::store::ResultStore;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::{AppState, ChildStatus};

pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Frame { height, .. } => {
            app.results
                .set_visible_rows(app.settings.visible_rows(height));
            vec![]
        }
        UiEvent::Terminal(Event::Key(key)) => handle_key(app, key),
        UiEvent::Terminal(Event::Paste(text)) => {
            if app.query.insert_str(&text) {
                send_query(app)
            } else {
                vec![]
            }
        }
        UiEvent::Terminal(_) | UiEvent::Tick => vec![],
        UiEvent::Pipeline(PipelineEvent::ResultsReady { count }) => {
            tracing::trace!(count, "results ready");
            vec![]
        }
        UiEvent::Pipeline(PipelineEvent::Closed { reason }) => {
            tracing::info!(%reason, "child stopped answering");
            app.child = ChildStatus::Stopped { reason };
            vec![]
        }
    }
}

fn send_query(app: &AppState) -> Vec<UiEffect> {
    vec![UiEffect::SendQuery {
        text: app.query.text().to_string(),
    }]
}

fn edited(app: &AppState, changed: bool) -> Vec<UiEffect> {
    if changed { send_query(app) } else { vec![] }
}

fn navigate(app: &AppState, step: fn(&ResultStore)) -> Vec<UiEffect> {
    step(&app.results);
    vec![]
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if matches!(key.kind, KeyEventKind::Release) {
        return vec![];
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Esc => vec![UiEffect::Quit],
        KeyCode::Char('c' | 'g') if ctrl => vec![UiEffect::Quit],
        KeyCode::Enter => commit(app),

        KeyCode::Up => navigate(app, ResultStore::move_previous),
        KeyCode::Char('p') if ctrl => navigate(app, ResultStore::move_previous),
        KeyCode::Down => navigate(app, ResultStore::move_next),
        KeyCode::Char('n') if ctrl => navigate(app, ResultStore::move_next),
        KeyCode::Tab => navigate(app, ResultStore::jump_to_next_group),
        KeyCode::BackTab => navigate(app, ResultStore::jump_to_previous_group),

        KeyCode::Backspace if app.query.is_empty() => {
            if app.settings.backspace_exit {
                vec![UiEffect::Quit]
            } else {
                vec![]
            }
        }
        KeyCode::Backspace if alt || ctrl => {
            let changed = app.query.delete_word_left();
            edited(app, changed)
        }
        KeyCode::Backspace => {
            let changed = app.query.delete_prev_char();
            edited(app, changed)
        }
        KeyCode::Delete => {
            let changed = app.query.delete_next_char();
            edited(app, changed)
        }
        KeyCode::Char('w') if ctrl => {
            let changed = app.query.delete_word_left();
            edited(app, changed)
        }
        KeyCode::Char('u') if ctrl => {
            let changed = app.query.clear();
            edited(app, changed)
        }

        KeyCode::Left => {
            app.query.move_left();
            vec![]
        }
        KeyCode::Right => {
            app.query.move_right();
            vec![]
        }
        KeyCode::Home => {
            app.query.move_home();
            vec![]
        }
        KeyCode::Char('a') if ctrl => {
            app.query.move_home();
            vec![]
        }
        KeyCode::End => {
            app.query.move_end();
            vec![]
        }
        KeyCode::Char('e') if ctrl => {
            app.query.move_end();
            vec![]
        }

        KeyCode::Char(ch) if !ctrl && !alt => {
            let changed = app.query.insert_char(ch);
            edited(app, changed)
        }
        _ => vec![],
    }
}

/// Enter: hand back the highlighted action. Titles cannot be chosen.
fn commit(app: &AppState) -> Vec<UiEffect> {
    match app.results.current_action() {
        Some(action) => vec![UiEffect::Commit { action }],
        None => vec![],
    }
}
