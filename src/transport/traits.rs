//! Transport seams
//!
//! Outbound: the write-only link to the pin daemon. Nothing is ever read
//! back from the daemon, so a link only needs the write half.
//!
//! Inbound: the listeners controllers and program uploads arrive on.

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Open link to the pin daemon
#[async_trait]
pub trait TransportStream: AsyncWrite + Send + Unpin + 'static {
    /// Flush and close the link
    async fn shutdown(&mut self) -> Result<()>;
}

/// Opens links to the pin daemon on demand
#[async_trait]
pub trait TransportConnector: Send + Sync {
    type Stream: TransportStream;

    async fn connect(&self) -> Result<Self::Stream>;

    /// Short transport name for log lines
    fn name(&self) -> &'static str;
}

/// Pause after a failed accept, so descriptor exhaustion does not spin
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of inbound client connections
#[async_trait]
pub trait Listener: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wait for the next client
    ///
    /// An error concerns this one attempt only; the listener stays usable.
    async fn accept(&mut self) -> io::Result<(Self::Stream, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[cfg(test)]
pub use scripted::ScriptedListener;
