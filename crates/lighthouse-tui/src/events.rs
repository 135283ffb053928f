//! UI event types.
//!
//! Everything the reducer reacts to arrives as a `UiEvent`: terminal input,
//! notifications from the reader task and the frame size.

use crossterm::event::Event;
use lighthouse_core::pipeline::PipelineEvent;

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Terminal size, emitted whenever it changes.
    Frame { width: u16, height: u16 },
    /// Raw crossterm input.
    Terminal(Event),
    /// Something happened on the child's side.
    Pipeline(PipelineEvent),
    /// Periodic wakeup.
    Tick,
}
