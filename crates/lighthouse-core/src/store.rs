//! Shared result store.
//!
//! The reader task publishes decoded sets here; the foreground navigates and
//! renders from it. One mutex guards the published set together with the
//! highlight and scroll position, so every reader of the store observes a
//! consistent triple. Sets are swapped by pointer and never mutated, so a
//! [`StoreSnapshot`] stays valid after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::protocol::{ResultRecord, ResultSet};

pub type SharedResults = Arc<ResultStore>;

/// Highlighted row and first visible row, both indices into the current set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub highlight: usize,
    pub scroll: usize,
}

/// Consistent read of the store taken under one lock acquisition.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub results: Arc<ResultSet>,
    pub selection: SelectionState,
    pub visible_rows: usize,
}

impl StoreSnapshot {
    /// Records in the visible window, paired with their index in the set.
    pub fn visible(&self) -> impl Iterator<Item = (usize, ResultRecord<'_>)> {
        self.results
            .iter()
            .enumerate()
            .skip(self.selection.scroll)
            .take(self.visible_rows)
    }

    pub fn highlighted(&self) -> Option<ResultRecord<'_>> {
        self.results.get(self.selection.highlight)
    }

    /// Number of rows the list occupies on screen.
    pub fn shown_rows(&self) -> usize {
        self.results.len().min(self.visible_rows)
    }
}

#[derive(Debug)]
struct StoreState {
    results: Arc<ResultSet>,
    selection: SelectionState,
    visible_rows: usize,
}

#[derive(Debug, Clone, Copy)]
struct Group {
    start: usize,
    first_actionable: Option<usize>,
}

impl StoreState {
    fn rows(&self) -> usize {
        self.visible_rows.max(1)
    }

    fn scroll_into_view(&mut self) {
        let len = self.results.len();
        let rows = self.rows();
        let SelectionState { highlight, scroll } = &mut self.selection;
        if len <= rows {
            *scroll = 0;
            return;
        }
        if *highlight >= *scroll + rows {
            *scroll = *highlight + 1 - rows;
        } else if *highlight < *scroll {
            *scroll = *highlight;
        }
        *scroll = (*scroll).min(len - rows);
    }

    fn step(&mut self, forward: bool) {
        let len = self.results.len();
        if len == 0 {
            return;
        }
        let mut index = self.selection.highlight;
        for _ in 0..len {
            index = if forward {
                (index + 1) % len
            } else {
                (index + len - 1) % len
            };
            if self.results.is_actionable(index) {
                self.selection.highlight = index;
                self.scroll_into_view();
                return;
            }
        }
    }

    /// Titles split the list into groups; the list start always begins one.
    fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        for (index, record) in self.results.iter().enumerate() {
            if index == 0 || record.is_title() {
                groups.push(Group {
                    start: index,
                    first_actionable: None,
                });
            }
            if !record.is_title()
                && let Some(group) = groups.last_mut()
                && group.first_actionable.is_none()
            {
                group.first_actionable = Some(index);
            }
        }
        groups
    }

    fn jump(&mut self, forward: bool) {
        let groups = self.groups();
        if groups.is_empty() {
            return;
        }
        let highlight = self.selection.highlight;
        let current = groups
            .iter()
            .rposition(|group| group.start <= highlight)
            .unwrap_or(0);
        let on_title = !self.results.is_actionable(highlight);

        let count = groups.len();
        // Resting on a title means its own group has not been entered yet.
        let first_offset = usize::from(!(forward && on_title));
        for offset in first_offset..first_offset + count {
            let candidate = if forward {
                (current + offset) % count
            } else {
                (current + count * 2 - offset) % count
            };
            if let Some(target) = groups[candidate].first_actionable {
                self.selection.highlight = target;
                self.scroll_into_view();
                return;
            }
        }
    }
}

/// Current results plus selection, guarded by a single mutex.
#[derive(Debug)]
pub struct ResultStore {
    inner: Mutex<StoreState>,
}

impl ResultStore {
    pub fn new(visible_rows: usize) -> Self {
        Self {
            inner: Mutex::new(StoreState {
                results: Arc::new(ResultSet::default()),
                selection: SelectionState::default(),
                visible_rows,
            }),
        }
    }

    pub fn shared(visible_rows: usize) -> SharedResults {
        Arc::new(Self::new(visible_rows))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // The state is plain data; a panic elsewhere cannot leave it torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a new set. The highlight is clamped to the new length and the
    /// scroll offset adjusted so the highlight stays visible.
    pub fn replace(&self, results: ResultSet) {
        let mut state = self.lock();
        let len = results.len();
        state.results = Arc::new(results);
        if len == 0 {
            state.selection = SelectionState::default();
            return;
        }
        state.selection.highlight = state.selection.highlight.min(len - 1);
        state.scroll_into_view();
    }

    /// Changes how many rows the list can show.
    pub fn set_visible_rows(&self, rows: usize) {
        let mut state = self.lock();
        state.visible_rows = rows;
        state.scroll_into_view();
    }

    /// Moves to the next actionable record, wrapping at the end.
    pub fn move_next(&self) {
        self.lock().step(true);
    }

    /// Moves to the previous actionable record, wrapping at the start.
    pub fn move_previous(&self) {
        self.lock().step(false);
    }

    /// Moves to the first actionable record of the next group.
    pub fn jump_to_next_group(&self) {
        self.lock().jump(true);
    }

    /// Moves to the first actionable record of the previous group.
    pub fn jump_to_previous_group(&self) {
        self.lock().jump(false);
    }

    /// Action of the highlighted record, if it has one.
    pub fn current_action(&self) -> Option<String> {
        let state = self.lock();
        state
            .results
            .get(state.selection.highlight)
            .and_then(|record| record.action)
            .map(str::to_owned)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            results: Arc::clone(&state.results),
            selection: state.selection,
            visible_rows: state.visible_rows,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
