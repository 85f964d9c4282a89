//! Interactive control sessions
//!
//! This module handles:
//! - Accepting controller connections
//! - One batched power state per connection
//! - Turning each control message into a single submission

mod connection;
mod control;

pub use connection::serve_control;
