//! Pin Daemon Bridge
//!
//! Delivers resolved actuator output to the daemon that physically drives
//! the GPIO pins.

mod client;
pub mod sink;

pub use client::DaemonClient;
pub use sink::CommandSink;
