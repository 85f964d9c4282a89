//! Uploaded Programs
//!
//! Programs drive the tank step by step through an autosubmit power state,
//! each on its own task, alongside any interactive sessions.

mod runner;
mod upload;

pub use upload::serve_uploads;
