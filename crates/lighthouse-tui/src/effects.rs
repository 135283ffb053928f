//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! The reducer itself never touches the child or the terminal.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    /// Send the query text to the child.
    SendQuery { text: String },
    /// Hand the chosen action back to the caller and leave.
    Commit { action: String },
    /// Leave the event loop.
    Quit,
}
