//! Command tables for interactive control
//!
//! Maps the textual control alphabet onto direction requests against a
//! power state.

mod control;

pub use control::ControlCommand;
