//! Pin daemon client with a persistent, lazily opened connection

use super::sink::CommandSink;
use crate::transport::{TransportConnector, TransportStream};
use anyhow::Result;
use async_trait::async_trait;
use tank_shared::codec::{self, DaemonCommand};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Write attempts per command: the original write plus one retry
const SEND_ATTEMPTS: usize = 2;

/// Client for the pin daemon
///
/// One instance is shared by every session and program. All access goes
/// through a single lock, so each command reaches the socket whole.
pub struct DaemonClient<C: TransportConnector> {
    connector: C,
    connection: Mutex<Option<C::Stream>>,
}

impl<C: TransportConnector> DaemonClient<C> {
    /// Create a client; nothing is connected until the first send
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: Mutex::new(None),
        }
    }

    /// Whether a connection is currently held
    #[cfg(test)]
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Send a command, best-effort
    ///
    /// Connects lazily. A failed write reconnects and retries once; if that
    /// also fails the command is dropped and the connection released. Errors
    /// are logged, never returned.
    pub async fn send(&self, command: &DaemonCommand) {
        let line = codec::encode(command);
        let mut connection = self.connection.lock().await;

        info!("[GPIOD] writing: {:?}", command.to_string());

        if connection.is_none() {
            if let Err(e) = self.reconnect(&mut *connection).await {
                error!("[GPIOD] dropping {:?}, connect failed: {}", command.to_string(), e);
                return;
            }
        }

        for attempt in 1..=SEND_ATTEMPTS {
            let Some(stream) = connection.as_mut() else {
                return;
            };

            let result = async {
                stream.write_all(&line).await?;
                stream.flush().await
            }
            .await;

            match result {
                Ok(()) => return,
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!("[GPIOD] reconnect due to an error: {}", e);
                    if let Err(e) = self.reconnect(&mut *connection).await {
                        error!("[GPIOD] dropping {:?}, reconnect failed: {}", command.to_string(), e);
                        return;
                    }
                }
                Err(e) => {
                    error!("[GPIOD] dropping {:?} after retry: {}", command.to_string(), e);
                    close(&mut *connection).await;
                }
            }
        }
    }

    /// Replace the held connection with a fresh one
    async fn reconnect(&self, connection: &mut Option<C::Stream>) -> Result<()> {
        close(connection).await;

        let stream = self.connector.connect().await?;
        debug!("[GPIOD] connected via {}", self.connector.name());
        *connection = Some(stream);
        Ok(())
    }
}

async fn close<S: TransportStream>(connection: &mut Option<S>) {
    if let Some(mut stream) = connection.take() {
        if let Err(e) = TransportStream::shutdown(&mut stream).await {
            debug!("[GPIOD] error closing connection: {}", e);
        }
    }
}

#[async_trait]
impl<C: TransportConnector> CommandSink for DaemonClient<C> {
    async fn send_command(&self, command: DaemonCommand) {
        self.send(&command).await;
    }
}
