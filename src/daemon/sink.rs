//! Destination for resolved daemon commands

use async_trait::async_trait;
use tank_shared::DaemonCommand;

/// Anything that can deliver commands to the pin daemon
///
/// Delivery is best-effort: implementations log failures instead of
/// returning them.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send_command(&self, command: DaemonCommand);
}

#[cfg(test)]
pub use recording::RecordingSink;
