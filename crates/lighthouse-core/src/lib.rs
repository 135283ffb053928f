//! Core of the lighthouse popup launcher.
//!
//! Everything here is independent of the terminal: the wire protocol spoken by
//! the query child, the inline markup layout engine, the shared result store and
//! the background pipeline that feeds it.

pub mod child;
pub mod config;
pub mod images;
pub mod interrupt;
pub mod logging;
pub mod markup;
pub mod pipeline;
pub mod protocol;
pub mod store;
